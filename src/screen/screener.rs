//! Static import screening
//!
//! Parses Python source with tree-sitter and reports every import of a
//! forbidden top-level module, anywhere in the tree, in source order. Source
//! that does not parse cleanly is rejected regardless of policy. Nothing is
//! ever executed here.

use super::submission::{ForbiddenImport, ScreenedSubmission, Screening, Submission, Verdict};
use crate::config::types::{ForbiddenImportPolicy, GradeError, GraderConfig, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

const SYNTAX_PREFIX: &str = "Syntax error while parsing file";

/// Forbidden-import screener
#[derive(Debug, Clone)]
pub struct Screener {
    forbidden: BTreeSet<String>,
    policy: ForbiddenImportPolicy,
}

impl Screener {
    pub fn new(forbidden: BTreeSet<String>, policy: ForbiddenImportPolicy) -> Self {
        Self { forbidden, policy }
    }

    pub fn from_config(config: &GraderConfig) -> Self {
        Self::new(
            config.forbidden_imports.clone(),
            config.forbidden_import_policy,
        )
    }

    /// Same forbidden set, different policy
    pub fn with_policy(&self, policy: ForbiddenImportPolicy) -> Self {
        Self {
            forbidden: self.forbidden.clone(),
            policy,
        }
    }

    pub fn policy(&self) -> ForbiddenImportPolicy {
        self.policy
    }

    /// Screen a source file on disk
    pub fn screen(&self, path: &Path) -> Result<Verdict> {
        let source = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.screen_source(&name, &source)
    }

    /// Screen source bytes; `name` is only used in diagnostics
    pub fn screen_source(&self, name: &str, source: &[u8]) -> Result<Verdict> {
        let Ok(text) = std::str::from_utf8(source) else {
            return Ok(syntax_verdict(format!(
                "{}: source is not valid UTF-8",
                SYNTAX_PREFIX
            )));
        };

        let tree = parse_python(text)?;
        let root = tree.root_node();
        if root.has_error() {
            let detail = describe_syntax_error(root, name);
            return Ok(syntax_verdict(format!("{}: {}", SYNTAX_PREFIX, detail)));
        }
        if let Some(detail) = describe_legacy_syntax(root, name) {
            return Ok(syntax_verdict(format!("{}: {}", SYNTAX_PREFIX, detail)));
        }

        let forbidden_imports: Vec<ForbiddenImport> = collect_imports(root, text.as_bytes())
            .into_iter()
            .filter(|import| self.is_forbidden(&import.module))
            .map(|import| ForbiddenImport {
                module: import.module,
                line: import.line,
            })
            .collect();

        let diagnostics = forbidden_imports
            .iter()
            .map(|import| format!("Forbidden import detected: {}", import.module))
            .collect();
        let ok = forbidden_imports.is_empty() || self.policy == ForbiddenImportPolicy::Warn;

        Ok(Verdict {
            ok,
            diagnostics,
            forbidden_imports,
            syntax_error: false,
        })
    }

    /// Screen a submission and gate it for execution
    pub fn screen_submission(&self, submission: Submission) -> Result<Screening> {
        let verdict = self.screen_source(submission.name(), submission.source())?;
        if verdict.ok {
            Ok(Screening::Admitted(ScreenedSubmission::new(
                submission, verdict,
            )))
        } else {
            Ok(Screening::Rejected {
                submission,
                verdict,
            })
        }
    }

    fn is_forbidden(&self, module: &str) -> bool {
        let top_level = module.split('.').next().unwrap_or(module);
        self.forbidden.contains(top_level)
    }
}

fn syntax_verdict(diagnostic: String) -> Verdict {
    Verdict {
        ok: false,
        diagnostics: vec![diagnostic],
        forbidden_imports: Vec::new(),
        syntax_error: true,
    }
}

fn parse_python(text: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| GradeError::Parse(format!("parser init: {}", e)))?;
    parser
        .parse(text, None)
        .ok_or_else(|| GradeError::Parse("parser returned no tree".to_string()))
}

/// Children of `node` in source order
fn children<'t>(node: Node<'t>) -> impl Iterator<Item = Node<'t>> {
    (0..node.child_count()).filter_map(move |i| node.child(i))
}

/// Location and nature of the first ERROR or MISSING node
fn describe_syntax_error(root: Node, name: &str) -> String {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            let what = if node.is_missing() {
                format!("expected '{}'", node.kind())
            } else {
                "invalid syntax".to_string()
            };
            return format!(
                "{} ({}, line {}, column {})",
                what,
                name,
                pos.row + 1,
                pos.column + 1
            );
        }
        if node.has_error() {
            let mut kids: Vec<Node> = children(node).collect();
            kids.reverse();
            stack.extend(kids);
        }
    }
    format!("invalid syntax ({})", name)
}

/// Python 2 forms the grammar accepts but a Python 3 interpreter does not:
/// `print x`, `print >>f, x`, `exec code` and the `<>` operator
fn describe_legacy_syntax(root: Node, name: &str) -> Option<String> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let what = match node.kind() {
            "print_statement" => Some("Python 2 print statement"),
            "exec_statement" => Some("Python 2 exec statement"),
            "<>" => Some("Python 2 '<>' operator"),
            _ => None,
        };
        if let Some(what) = what {
            let pos = node.start_position();
            return Some(format!(
                "{} ({}, line {}, column {})",
                what,
                name,
                pos.row + 1,
                pos.column + 1
            ));
        }
        let mut kids: Vec<Node> = children(node).collect();
        kids.reverse();
        stack.extend(kids);
    }
    None
}

/// An import as written, before the forbidden set is consulted
struct ImportRef {
    module: String,
    line: usize,
}

/// Every imported module name in source order
fn collect_imports(root: Node, source: &[u8]) -> Vec<ImportRef> {
    let mut found = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        let line = node.start_position().row + 1;
        match node.kind() {
            "import_statement" => {
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    let dotted = if name.kind() == "aliased_import" {
                        name.child_by_field_name("name")
                    } else {
                        Some(name)
                    };
                    if let Some(module) = dotted.and_then(|d| dotted_name(d, source)) {
                        found.push(ImportRef { module, line });
                    }
                }
                continue;
            }
            "import_from_statement" => {
                let module = node.child_by_field_name("module_name").and_then(|m| {
                    if m.kind() == "relative_import" {
                        children(m)
                            .find(|c| c.kind() == "dotted_name")
                            .and_then(|d| dotted_name(d, source))
                    } else {
                        dotted_name(m, source)
                    }
                });
                if let Some(module) = module {
                    found.push(ImportRef { module, line });
                }
                continue;
            }
            "future_import_statement" => {
                found.push(ImportRef {
                    module: "__future__".to_string(),
                    line,
                });
                continue;
            }
            _ => {}
        }

        let mut kids: Vec<Node> = children(node).collect();
        kids.reverse();
        stack.extend(kids);
    }

    found
}

/// `a.b.c` from a dotted_name node, ignoring whitespace and line continuations
fn dotted_name(node: Node, source: &[u8]) -> Option<String> {
    if node.kind() != "dotted_name" {
        return None;
    }
    let parts: Vec<&str> = children(node)
        .filter(|c| c.kind() == "identifier")
        .filter_map(|c| c.utf8_text(source).ok())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screener(policy: ForbiddenImportPolicy) -> Screener {
        Screener::from_config(&GraderConfig {
            forbidden_import_policy: policy,
            ..GraderConfig::default()
        })
    }

    #[test]
    fn test_permitted_imports_pass_cleanly() {
        let source = b"import numpy as np\nimport matplotlib.pyplot as plt\nfrom math import pi\nresult = np.array([pi])\n";
        let verdict = screener(ForbiddenImportPolicy::Reject)
            .screen_source("ok.py", source)
            .unwrap();
        assert!(verdict.ok);
        assert!(verdict.diagnostics.is_empty());
    }

    #[test]
    fn test_forbidden_import_rejected() {
        let verdict = screener(ForbiddenImportPolicy::Reject)
            .screen_source("bad.py", b"import os\nresult = 1\n")
            .unwrap();
        assert!(!verdict.ok);
        assert_eq!(verdict.diagnostics, vec!["Forbidden import detected: os"]);
        assert_eq!(verdict.forbidden_imports[0].line, 1);
    }

    #[test]
    fn test_forbidden_import_warn_policy_keeps_ok() {
        let verdict = screener(ForbiddenImportPolicy::Warn)
            .screen_source("bad.py", b"import os\nresult = 1\n")
            .unwrap();
        assert!(verdict.ok);
        assert_eq!(verdict.diagnostics, vec!["Forbidden import detected: os"]);
    }

    #[test]
    fn test_all_import_forms_in_source_order() {
        let source = br#"
import numpy, os.path as p
from subprocess import run
from .shutil import copy
from . import sys
def helper():
    import sys
    class Inner:
        from os import environ
"#;
        let verdict = screener(ForbiddenImportPolicy::Reject)
            .screen_source("nested.py", source)
            .unwrap();
        assert_eq!(
            verdict.diagnostics,
            vec![
                "Forbidden import detected: os.path",
                "Forbidden import detected: subprocess",
                "Forbidden import detected: shutil",
                "Forbidden import detected: sys",
                "Forbidden import detected: os",
            ]
        );
        let lines: Vec<usize> = verdict.forbidden_imports.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![2, 3, 4, 7, 9]);
    }

    #[test]
    fn test_prefix_match_is_on_top_level_only() {
        let verdict = screener(ForbiddenImportPolicy::Reject)
            .screen_source("x.py", b"import osmosis\nimport system_tools\n")
            .unwrap();
        assert!(verdict.ok);
    }

    #[test]
    fn test_whitespace_in_dotted_name_normalized() {
        let verdict = screener(ForbiddenImportPolicy::Reject)
            .screen_source("x.py", b"import os . path\n")
            .unwrap();
        assert_eq!(verdict.diagnostics, vec!["Forbidden import detected: os.path"]);
    }

    #[test]
    fn test_syntax_error_rejected_under_both_policies() {
        for policy in [ForbiddenImportPolicy::Reject, ForbiddenImportPolicy::Warn] {
            let verdict = screener(policy)
                .screen_source("broken.py", b"result = [1, 2\ndef f(:\n")
                .unwrap();
            assert!(!verdict.ok);
            assert!(verdict.syntax_error);
            assert_eq!(verdict.diagnostics.len(), 1);
            assert!(verdict.diagnostics[0].starts_with("Syntax error while parsing file: "));
            assert!(verdict.diagnostics[0].contains("broken.py, line"));
        }
    }

    #[test]
    fn test_python2_statements_are_syntax_errors() {
        let cases: [(&[u8], &str, usize); 4] = [
            (b"print \"hello\"\nresult = 1\n", "print statement", 1),
            (b"result = 1\nexec \"x = 1\"\n", "exec statement", 2),
            (b"import sys\nf = sys.stderr\nprint >>f, 'x'\n", "print statement", 3),
            (b"result = 1 <> 2\n", "'<>' operator", 1),
        ];
        for (source, what, line) in cases {
            for policy in [ForbiddenImportPolicy::Reject, ForbiddenImportPolicy::Warn] {
                let verdict = screener(policy).screen_source("legacy.py", source).unwrap();
                assert!(!verdict.ok, "{:?} admitted", what);
                assert!(verdict.syntax_error);
                assert!(verdict.forbidden_imports.is_empty());
                assert!(verdict.diagnostics[0].starts_with("Syntax error while parsing file: "));
                assert!(verdict.diagnostics[0].contains(what));
                assert!(verdict.diagnostics[0].contains(&format!("legacy.py, line {},", line)));
            }
        }
    }

    #[test]
    fn test_python3_print_call_is_accepted() {
        let verdict = screener(ForbiddenImportPolicy::Reject)
            .screen_source("p3.py", b"print(\"hello\")\nprint (1, 2)\nprint()\nexec(\"x = 1\")\n")
            .unwrap();
        assert!(verdict.ok, "{:?}", verdict.diagnostics);
        assert!(!verdict.syntax_error);
    }

    #[test]
    fn test_invalid_utf8_is_syntax_error() {
        let verdict = screener(ForbiddenImportPolicy::Reject)
            .screen_source("bin.py", &[0x66, 0xff, 0xfe])
            .unwrap();
        assert!(!verdict.ok);
        assert!(verdict.syntax_error);
    }

    #[test]
    fn test_screen_submission_gates_execution() {
        let s = screener(ForbiddenImportPolicy::Reject);

        let admitted = s
            .screen_submission(Submission::from_source("a.py", "result = 1\n"))
            .unwrap();
        assert!(matches!(admitted, Screening::Admitted(_)));

        let rejected = s
            .screen_submission(Submission::from_source("b.py", "import shutil\n"))
            .unwrap();
        match rejected {
            Screening::Rejected { submission, verdict } => {
                assert_eq!(submission.name(), "b.py");
                assert!(!verdict.ok);
            }
            Screening::Admitted(_) => panic!("forbidden import was admitted"),
        }
    }

    #[test]
    fn test_screen_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("student.py");
        std::fs::write(&path, "import subprocess\n").unwrap();

        let verdict = screener(ForbiddenImportPolicy::Reject).screen(&path).unwrap();
        assert_eq!(
            verdict.diagnostics,
            vec!["Forbidden import detected: subprocess"]
        );
    }
}
