/// Programming language implied by a source file name. Docs, data and
/// config formats are not languages for stack purposes and yield `None`.
pub fn source_language(filename: &str) -> Option<&'static str> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".d.ts") {
        return Some("TypeScript");
    }

    let (_, extension) = lower.rsplit_once('.')?;
    let language = match extension {
        "rs" => "Rust",
        "py" | "pyw" | "pyx" | "ipynb" => "Python",
        "js" | "mjs" | "cjs" | "jsx" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "go" => "Go",
        "java" => "Java",
        "kt" | "kts" => "Kotlin",
        "scala" => "Scala",
        "clj" => "Clojure",
        "c" | "h" => "C",
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" => "C++",
        "cs" => "C#",
        "swift" => "Swift",
        "m" | "mm" => "Objective-C",
        "rb" => "Ruby",
        "php" => "PHP",
        "ex" | "exs" => "Elixir",
        "erl" => "Erlang",
        "hs" => "Haskell",
        "ml" | "mli" => "OCaml",
        "fs" | "fsx" => "F#",
        "sh" | "bash" | "zsh" => "Shell",
        "ps1" => "PowerShell",
        "lua" => "Lua",
        "r" | "rmd" => "R",
        "dart" => "Dart",
        "zig" => "Zig",
        "jl" => "Julia",
        "sol" => "Solidity",
        "tf" => "Terraform",
        "vue" => "Vue",
        "svelte" => "Svelte",
        _ => return None,
    };
    Some(language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_language() {
        assert_eq!(source_language("main.rs"), Some("Rust"));
        assert_eq!(source_language("App.PY"), Some("Python"));
        assert_eq!(source_language("types.d.ts"), Some("TypeScript"));
        assert_eq!(source_language("notebook.ipynb"), Some("Python"));
        assert_eq!(source_language("README.md"), None);
        assert_eq!(source_language("Makefile"), None);
    }
}
