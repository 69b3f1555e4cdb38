//! Post-extraction normalization of a generated file set.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::error::TaskError;
use crate::model::ENTRY_POINT;

pub const README: &str = "README.md";
pub const GITIGNORE: &str = ".gitignore";

const MIT_SECTION: &str = "\n\n## License\n\nMIT License\n\n\
Permission is hereby granted, free of charge, to any person obtaining a copy of this \
software and associated documentation files (the \"Software\"), to deal in the Software \
without restriction, including without limitation the rights to use, copy, modify, merge, \
publish, distribute, sublicense, and/or sell copies of the Software.\n";

const DEFAULT_GITIGNORE: &str = "\
# Environment variables
.env
.env.local
.env.*.local

# Node
node_modules/
npm-debug.log
yarn-error.log

# IDE
.vscode/
.idea/
*.swp
*~

# OS
.DS_Store
Thumbs.db

# Build
dist/
build/

# Secrets
*.pem
*.key
secrets.json
";

/// Readme synthesised when the model did not produce one.
pub fn default_readme(task: &str, brief: &str) -> String {
    format!(
        "# {task}\n\n\
## Summary\n\n{brief}\n\n\
## Usage\n\n\
Open `{ENTRY_POINT}` in a browser, or visit the published site.\n\n\
## Code Explanation\n\n\
A static, client-side web application. All logic runs in the browser; no server is required.{MIT_SECTION}"
    )
}

pub fn default_gitignore() -> &'static str {
    DEFAULT_GITIGNORE
}

/// Ensures the entry point exists, and fills in a readme and ignore file when missing.
///
/// A readme that never mentions MIT gets a license section appended.
pub fn normalize_files(
    mut files: BTreeMap<String, String>,
    task: &str,
    brief: &str,
) -> Result<BTreeMap<String, String>, TaskError> {
    if !files.contains_key(ENTRY_POINT) {
        warn!(task, files = files.len(), "[SCAFFOLD] Generated files lack the entry point");
        return Err(TaskError::MissingEntryPoint {
            path: ENTRY_POINT.to_string(),
        });
    }

    match files.get_mut(README) {
        Some(readme) if !readme.contains("MIT") => {
            info!(task, "[SCAFFOLD] Appending MIT license section to README");
            readme.push_str(MIT_SECTION);
        }
        Some(_) => {}
        None => {
            info!(task, "[SCAFFOLD] Synthesising default README");
            files.insert(README.to_string(), default_readme(task, brief));
        }
    }

    if !files.contains_key(GITIGNORE) {
        info!(task, "[SCAFFOLD] Synthesising default .gitignore");
        files.insert(GITIGNORE.to_string(), default_gitignore().to_string());
    }

    Ok(files)
}
