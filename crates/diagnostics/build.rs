//! Generates the diagnostic code table from `spec/diagnostics.json`.
//!
//! One pass over the entries writes three files into `OUT_DIR`:
//! `generated_codes.rs` (`pub const NAME: &str = "CMDxxxx"`),
//! `generated_explain.rs` and `generated_severity.rs` (both `match id`
//! expressions included by `lib.rs`).

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

const TABLE: &str = "spec/diagnostics.json";

#[derive(Deserialize)]
struct Table {
    diagnostics: Vec<Entry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Entry {
    id: String,
    const_name: String,
    severity: Level,
    summary: String,
    description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum Level {
    Error,
    Warn,
    Info,
}

impl Level {
    fn path(&self) -> &'static str {
        match self {
            Level::Error => "Severity::Error",
            Level::Warn => "Severity::Warn",
            Level::Info => "Severity::Info",
        }
    }
}

fn main() {
    println!("cargo:rerun-if-changed={TABLE}");

    let raw = fs::read_to_string(TABLE).unwrap_or_else(|e| panic!("cannot read {TABLE}: {e}"));
    let table: Table =
        serde_json::from_str(&raw).unwrap_or_else(|e| panic!("cannot parse {TABLE}: {e}"));

    let mut codes = String::new();
    let mut explain = String::from("match id {\n");
    let mut severity = String::from("match id {\n");

    // Codes are listed in ascending order, which also rules out duplicates.
    for pair in table.diagnostics.windows(2) {
        assert!(
            pair[0].id < pair[1].id,
            "{TABLE}: '{}' must come after '{}'",
            pair[1].id,
            pair[0].id
        );
    }

    for entry in &table.diagnostics {
        let id = &entry.id;
        assert!(
            id.len() == 7 && id.starts_with("CMD") && id[3..].bytes().all(|b| b.is_ascii_digit()),
            "{TABLE}: '{id}' is not a CMDnnnn code"
        );

        let _ = writeln!(
            codes,
            "/// {}\npub const {}: &str = \"{id}\";",
            entry.summary, entry.const_name
        );
        let _ = writeln!(explain, "    \"{id}\" => Some({:?}),", entry.description);
        let _ = writeln!(severity, "    \"{id}\" => Some({}),", entry.severity.path());
    }
    explain.push_str("    _ => None,\n}\n");
    severity.push_str("    _ => None,\n}\n");

    let out = PathBuf::from(env::var("OUT_DIR").unwrap_or_else(|e| panic!("OUT_DIR: {e}")));
    for (name, body) in [
        ("generated_codes.rs", codes),
        ("generated_explain.rs", explain),
        ("generated_severity.rs", severity),
    ] {
        fs::write(out.join(name), body).unwrap_or_else(|e| panic!("cannot write {name}: {e}"));
    }
}
