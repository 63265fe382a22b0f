pub mod languages;
pub mod stack;

use std::collections::HashMap;

pub use languages::source_language;
pub use stack::detect_tech_stack;

/// Maps the many spellings a model uses for a skill onto one display name.
pub struct SkillTaxonomy {
    canonical: HashMap<String, &'static str>,
}

const SKILLS: &[(&str, &[&str])] = &[
    // Languages
    ("Rust", &["rs"]),
    ("Python", &["py", "python3"]),
    ("JavaScript", &["js", "ecmascript", "es6"]),
    ("TypeScript", &["ts"]),
    ("Go", &["golang"]),
    ("Java", &[]),
    ("Kotlin", &["kt"]),
    ("C++", &["cpp", "cxx"]),
    ("C#", &["csharp", "cs"]),
    ("Ruby", &["rb"]),
    ("SQL", &["plsql", "tsql"]),
    ("Shell", &["bash", "sh", "zsh", "shell scripting"]),
    // Frameworks
    ("React", &["reactjs", "react.js"]),
    ("Vue", &["vuejs", "vue.js"]),
    ("Next.js", &["nextjs", "next"]),
    ("Django", &[]),
    ("Flask", &[]),
    ("FastAPI", &["fast api"]),
    ("Streamlit", &[]),
    ("Express", &["expressjs", "express.js"]),
    ("Spring", &["spring boot", "springboot"]),
    ("Rails", &["ruby on rails", "ror"]),
    ("Axum", &[]),
    ("Flutter", &[]),
    // Tools
    ("Docker", &["dockerfile", "containerization"]),
    ("Kubernetes", &["k8s"]),
    ("Terraform", &["iac"]),
    ("AWS", &["amazon web services"]),
    ("GCP", &["google cloud", "google cloud platform"]),
    ("Git", &[]),
    ("GitHub Actions", &["gha"]),
    ("PostgreSQL", &["postgres", "psql"]),
    ("MongoDB", &["mongo"]),
    ("Redis", &[]),
    ("GraphQL", &["gql"]),
    ("REST APIs", &["rest", "restful", "rest api"]),
    // Domains and practices
    ("Machine Learning", &["ml", "deep learning", "ai"]),
    ("Data Science", &["data analysis", "analytics"]),
    ("Pandas", &[]),
    ("DevOps", &["sre"]),
    ("Testing", &["unit testing", "tdd", "integration testing"]),
    ("Documentation", &["docs", "technical writing"]),
    ("CI/CD", &["continuous integration", "continuous deployment"]),
];

impl SkillTaxonomy {
    pub fn new() -> Self {
        let mut canonical = HashMap::new();
        for (name, aliases) in SKILLS {
            canonical.insert(name.to_lowercase(), *name);
            for alias in aliases.iter() {
                canonical.insert(alias.to_lowercase(), *name);
            }
        }
        Self { canonical }
    }

    /// Known skills get their display name; unknown ones are trimmed as-is.
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim().trim_matches(|c: char| c == '`' || c == '*' || c == '"');
        self.canonical
            .get(&trimmed.to_lowercase())
            .map(|s| s.to_string())
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// Normalizes and drops blanks and case-insensitive repeats, keeping order.
    pub fn normalize_all<I, S>(&self, skills: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for skill in skills {
            let normalized = self.normalize(skill.as_ref());
            if normalized.is_empty() {
                continue;
            }
            if !out.iter().any(|s| s.eq_ignore_ascii_case(&normalized)) {
                out.push(normalized);
            }
        }
        out
    }
}

impl Default for SkillTaxonomy {
    fn default() -> Self {
        Self::new()
    }
}
