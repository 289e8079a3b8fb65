//! Build script for gvfiber-runtime
//!
//! Handles configuration merging:
//! 1. Start with library defaults
//! 2. If GVF_CONFIG_RS env var is set, parse user's config file
//! 3. Merge user values over defaults (user wins)
//! 4. Generate OUT_DIR/gvf_merged_config.rs
//!
//! User only needs to specify values they want to change.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration parameter definition
struct ConfigParam {
    name: &'static str,
    rust_type: &'static str,
    default_value: &'static str,
}

/// All configuration parameters with their defaults
const CONFIG_PARAMS: &[ConfigParam] = &[
    ConfigParam {
        name: "NUM_WORKERS",
        rust_type: "usize",
        default_value: "4",
    },
    ConfigParam {
        name: "LOCAL_QUEUE_CAPACITY",
        rust_type: "usize",
        default_value: "256",
    },
    ConfigParam {
        name: "STACK_SIZE",
        rust_type: "usize",
        default_value: "64 * 1024", // 64KB
    },
    ConfigParam {
        name: "PRESERVE_FPU",
        rust_type: "bool",
        default_value: "true",
    },
    ConfigParam {
        name: "STEAL_ATTEMPTS",
        rust_type: "usize",
        default_value: "4",
    },
    ConfigParam {
        name: "DEBUG_LOGGING",
        rust_type: "bool",
        default_value: "false",
    },
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest_path = Path::new(&out_dir).join("gvf_merged_config.rs");

    let mut config: HashMap<&str, String> = CONFIG_PARAMS
        .iter()
        .map(|p| (p.name, p.default_value.to_string()))
        .collect();

    if let Ok(user_path) = env::var("GVF_CONFIG_RS") {
        println!("cargo:rerun-if-changed={}", user_path);

        match fs::read_to_string(&user_path) {
            Ok(content) => {
                for warning in parse_and_merge(&content, &mut config) {
                    println!("cargo:warning={}", warning);
                }
                println!("cargo:warning=Using custom config: {}", user_path);
            }
            Err(e) => {
                println!(
                    "cargo:warning=Failed to read GVF_CONFIG_RS ({}): {}",
                    user_path, e
                );
            }
        }
    }

    println!("cargo:rerun-if-env-changed=GVF_CONFIG_RS");
    println!("cargo:rerun-if-changed=build.rs");

    let output = generate_config(&config);
    fs::write(&dest_path, output).expect("Failed to write merged config");
}

/// Merge `pub const NAME: TYPE = VALUE;` lines into `config`
///
/// Returns one warning per line that was ignored.
fn parse_and_merge(content: &str, config: &mut HashMap<&str, String>) -> Vec<String> {
    let mut warnings = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") || !line.starts_with("pub const ") {
            continue;
        }

        let Some((name, rust_type, value)) = parse_const_line(line) else {
            warnings.push(format!("Unparsable config line: {}", line));
            continue;
        };

        match CONFIG_PARAMS.iter().find(|p| p.name == name) {
            Some(param) if param.rust_type == rust_type => {
                config.insert(param.name, value);
            }
            Some(param) => warnings.push(format!(
                "Config parameter {} has type {}, expected {}",
                name, rust_type, param.rust_type
            )),
            None => warnings.push(format!("Unknown config parameter: {}", name)),
        }
    }

    warnings
}

/// Parse a single const line and return (name, type, value)
fn parse_const_line(line: &str) -> Option<(String, String, String)> {
    let rest = line.strip_prefix("pub const ")?.trim();

    let colon_pos = rest.find(':')?;
    let eq_pos = rest.find('=')?;
    if eq_pos < colon_pos {
        return None;
    }
    let semi_pos = rest.rfind(';').unwrap_or(rest.len());

    let name = rest[..colon_pos].trim().to_string();
    let rust_type = rest[colon_pos + 1..eq_pos].trim().to_string();
    let value = rest[eq_pos + 1..semi_pos].trim().to_string();

    Some((name, rust_type, value))
}

/// Generate the merged config Rust file
fn generate_config(config: &HashMap<&str, String>) -> String {
    let mut output = String::new();

    output.push_str("// Auto-generated by build.rs - do not edit\n");
    output.push_str("// Configuration merged from library defaults");
    if env::var("GVF_CONFIG_RS").is_ok() {
        output.push_str(" and user's gvf_config.rs");
    }
    output.push_str("\n\n");

    for param in CONFIG_PARAMS {
        let value = config
            .get(param.name)
            .map(String::as_str)
            .unwrap_or(param.default_value);
        output.push_str(&format!(
            "pub const {}: {} = {};\n",
            param.name, param.rust_type, value
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_const_line() {
        let result = parse_const_line("pub const NUM_WORKERS: usize = 8;");
        assert_eq!(
            result,
            Some(("NUM_WORKERS".into(), "usize".into(), "8".into()))
        );

        let result = parse_const_line("pub const STACK_SIZE: usize = 256 * 1024;");
        assert_eq!(
            result,
            Some(("STACK_SIZE".into(), "usize".into(), "256 * 1024".into()))
        );

        assert_eq!(parse_const_line("pub const BROKEN = 3;"), None);
    }

    #[test]
    fn test_parse_and_merge() {
        let mut config: HashMap<&str, String> = HashMap::new();
        config.insert("NUM_WORKERS", "4".into());
        config.insert("PRESERVE_FPU", "true".into());

        let user_config = r#"
            // Custom config
            pub const NUM_WORKERS: usize = 16;
            pub const PRESERVE_FPU: bool = false;
            pub const STEAL_ATTEMPTS: u32 = 2;
            pub const NOT_A_KNOB: usize = 1;
        "#;

        let warnings = parse_and_merge(user_config, &mut config);

        assert_eq!(config.get("NUM_WORKERS"), Some(&"16".to_string()));
        assert_eq!(config.get("PRESERVE_FPU"), Some(&"false".to_string()));
        assert!(!config.contains_key("STEAL_ATTEMPTS"));
        assert_eq!(warnings.len(), 2);
    }
}
