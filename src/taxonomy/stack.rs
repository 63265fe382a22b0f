use super::languages::source_language;

/// Files whose presence at the repository root names a technology.
const MARKERS: &[(&str, &str)] = &[
    ("cargo.toml", "Rust"),
    ("package.json", "Node.js"),
    ("tsconfig.json", "TypeScript"),
    ("requirements.txt", "Python"),
    ("pyproject.toml", "Python"),
    ("setup.py", "Python"),
    ("pipfile", "Python"),
    ("go.mod", "Go"),
    ("pom.xml", "Maven"),
    ("build.gradle", "Gradle"),
    ("build.gradle.kts", "Gradle"),
    ("gemfile", "Ruby"),
    ("composer.json", "PHP"),
    ("mix.exs", "Elixir"),
    ("pubspec.yaml", "Flutter"),
    ("cmakelists.txt", "CMake"),
    ("makefile", "Make"),
    ("dockerfile", "Docker"),
    ("docker-compose.yml", "Docker Compose"),
    ("docker-compose.yaml", "Docker Compose"),
    ("next.config.js", "Next.js"),
    ("vite.config.ts", "Vite"),
    ("vite.config.js", "Vite"),
    ("streamlit_app.py", "Streamlit"),
    (".github/", "GitHub Actions"),
    (".gitlab-ci.yml", "GitLab CI"),
];

/// Technologies detected from root entry names, first-seen order, no repeats.
pub fn detect_tech_stack(root_files: &[String]) -> Vec<String> {
    let mut stack: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !stack.iter().any(|s| s == name) {
            stack.push(name.to_string());
        }
    };

    for file in root_files {
        let lower = file.to_lowercase();
        if let Some((_, tech)) = MARKERS.iter().find(|(marker, _)| *marker == lower) {
            push(tech);
        } else if !lower.ends_with('/') {
            if let Some(language) = source_language(&lower) {
                push(language);
            }
        }
    }

    stack
}
