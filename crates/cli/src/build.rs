//! The build step
//!
//! Reads and validates the feature-flag configuration, then copies the
//! public assets into the build directory and substitutes the template
//! placeholders. Validation runs to completion before the first write so
//! a broken configuration can never leave a half-built output behind.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tracing::info;
use walkdir::WalkDir;

use cubedrill_common::template::{replace_many, Replacement};
use cubedrill_common::{BuildTarget, FeatureFlags, FlagSet};

const BUILD_DIR: &str = "build";
const PUBLIC_DIR: &str = "public";
const HTML_TEMPLATE_NAME: &str = "index.template.html";
const FEATURE_FLAGS_PATH: &str = "config/feature-flags.json";
const LOCAL_FLAG_OVERRIDE_PATH: &str = "config/local-feature-flags.json";

pub fn run(target: BuildTarget, root: &Path) -> Result<()> {
    let public_dir = root.join(PUBLIC_DIR);
    if !public_dir.exists() {
        bail!(
            "the public directory with path `{}` did not exist and must exist \
             at that path, maybe change your current directory",
            PUBLIC_DIR
        );
    }
    let flags_path = root.join(FEATURE_FLAGS_PATH);
    if !flags_path.exists() {
        bail!(
            "the feature flags config file with path `{}` did not exist and \
             must exist at that path, maybe change your current directory",
            FEATURE_FLAGS_PATH
        );
    }

    let flags = FeatureFlags::from_file(&flags_path)
        .with_context(|| format!("reading `{FEATURE_FLAGS_PATH}`"))?;
    let overrides = load_overrides(root, &flags)?;
    let selected = flags.select(target, overrides.as_ref());

    // Everything is validated; only now does the build directory change.
    let build_dir = root.join(BUILD_DIR);
    if build_dir.exists() {
        fs::remove_dir_all(&build_dir).context("clearing the build directory")?;
    }
    let built_public = build_dir.join(PUBLIC_DIR);
    copy_dir(&public_dir, &built_public).context("copying public assets")?;

    let template_path = built_public.join(HTML_TEMPLATE_NAME);
    let template = fs::read_to_string(&template_path)
        .with_context(|| format!("reading `{}`", template_path.display()))?;
    let built_index = replace_many(&template, &replacements(target, &selected))?;

    fs::remove_file(&template_path).context("removing the html template")?;
    fs::write(built_public.join("index.html"), built_index).context("writing index.html")?;

    info!(
        build_target = target.as_str(),
        "built trainer assets into `{}`",
        built_public.display()
    );
    Ok(())
}

fn load_overrides(root: &Path, flags: &FeatureFlags) -> Result<Option<FlagSet>> {
    let override_path = root.join(LOCAL_FLAG_OVERRIDE_PATH);
    if !override_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&override_path)
        .with_context(|| format!("reading `{LOCAL_FLAG_OVERRIDE_PATH}`"))?;
    let overrides: FlagSet = serde_json::from_str(&content)
        .with_context(|| format!("parsing `{LOCAL_FLAG_OVERRIDE_PATH}`"))?;
    flags.validate_overrides(&overrides)?;
    Ok(Some(overrides))
}

fn replacements(target: BuildTarget, flags: &FlagSet) -> Vec<Replacement> {
    let mut flag_object = serde_json::Map::new();
    // a guaranteed-present flag so the substituted object is never empty
    flag_object.insert("placeholder".to_string(), json!(false));
    for (key, value) in flags {
        flag_object.insert(key.clone(), json!(value));
    }

    let reporting_enabled = matches!(target, BuildTarget::Production | BuildTarget::Staging);
    let reporting_environment = match target {
        BuildTarget::Production => json!("production"),
        BuildTarget::Staging => json!("staging"),
        BuildTarget::Development => Value::Null,
    };

    vec![
        Replacement::new("FEATURE_FLAGS", Value::Object(flag_object)),
        Replacement::new("ERROR_REPORTING_ENABLE", json!(reporting_enabled)),
        Replacement::new("ERROR_REPORTING_ENVIRONMENT", reporting_environment),
    ]
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_replacements_disable_error_reporting() {
        let flags: FlagSet = [("newStatistics".to_string(), true)].into_iter().collect();
        let replacements = replacements(BuildTarget::Development, &flags);
        assert_eq!(replacements[1].value, json!(false));
        assert_eq!(replacements[2].value, Value::Null);
        assert_eq!(
            replacements[0].value,
            json!({"placeholder": false, "newStatistics": true})
        );
    }

    #[test]
    fn staging_replacements_name_the_environment() {
        let flags = FlagSet::new();
        let replacements = replacements(BuildTarget::Staging, &flags);
        assert_eq!(replacements[1].value, json!(true));
        assert_eq!(replacements[2].value, json!("staging"));
    }
}
