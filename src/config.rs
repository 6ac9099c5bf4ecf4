use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::cli::InputArgs;
use crate::element::{ClassPath, ElementSpec};
use crate::rename::Rename;
use crate::stages::StageRegistry;
use crate::transform::TransformOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenameConfig {
    pub from: String,
    pub to: String,
    pub hide_classes: bool,
}

/// One class path element as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub path: PathBuf,
    pub prefix: Option<String>,
    pub hide_classes: bool,
    pub root: bool,
    pub id: Option<String>,
    pub renames: Vec<RenameConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InlineConfig {
    pub inputs: Vec<InputConfig>,
    pub output: Option<PathBuf>,
    pub fail_on_duplicate: bool,
    pub extra_stages: Vec<String>,
}

impl InlineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: InlineConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        // Relative input paths are resolved against the config file's directory.
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            for input in &mut config.inputs {
                if input.path.is_relative() {
                    input.path = base.join(&input.path);
                }
            }
            if let Some(output) = config.output.as_mut().filter(|o| o.is_relative()) {
                *output = base.join(&*output);
            }
        }
        Ok(config)
    }

    /// Config file (if any) overlaid with command-line inputs and flags.
    pub fn from_args(args: &InputArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.merge_args(args)?;
        Ok(config)
    }

    fn merge_args(&mut self, args: &InputArgs) -> Result<()> {
        if let Some(root) = &args.root {
            self.inputs.insert(
                0,
                InputConfig {
                    path: root.clone(),
                    root: true,
                    ..InputConfig::default()
                },
            );
        }
        for spec in &args.inline {
            let (path, prefix) = parse_inline(spec)?;
            self.inputs.push(InputConfig {
                path,
                prefix,
                hide_classes: args.hide_classes,
                ..InputConfig::default()
            });
        }
        self.fail_on_duplicate |= args.fail_on_duplicate;
        for stage in &args.stages {
            if !self.extra_stages.contains(stage) {
                self.extra_stages.push(stage.clone());
            }
        }
        Ok(())
    }

    pub fn validate(&self, registry: &StageRegistry) -> Result<()> {
        if self.inputs.is_empty() {
            anyhow::bail!("No inputs: pass --root/--inline or list inputs in --config");
        }
        let roots = self.inputs.iter().filter(|i| i.root).count();
        if roots > 1 {
            anyhow::bail!("At most one input may be the root archive, found {roots}");
        }
        let mut ids = HashSet::new();
        for input in &self.inputs {
            if !input.path.exists() {
                anyhow::bail!("Input does not exist: {}", input.path.display());
            }
            if input.root && input.prefix.is_some() {
                anyhow::bail!(
                    "The root archive is never relocated, drop the prefix of {}",
                    input.path.display()
                );
            }
            if let Some(id) = &input.id {
                if !ids.insert(id.as_str()) {
                    anyhow::bail!("Duplicate input id: {id}");
                }
            }
        }
        let known: Vec<&str> = registry.names().collect();
        for stage in &self.extra_stages {
            if !known.contains(&stage.as_str()) {
                anyhow::bail!("Unknown stage {stage:?}, known stages: {}", known.join(", "));
            }
        }
        Ok(())
    }

    pub fn class_path(&self) -> Result<ClassPath> {
        let mut class_path = ClassPath::new();
        for input in &self.inputs {
            class_path.add(input.element_spec()?);
        }
        Ok(class_path)
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            fail_on_duplicate: self.fail_on_duplicate,
            extra_stages: self.extra_stages.clone(),
        }
    }
}

impl InputConfig {
    fn element_spec(&self) -> Result<ElementSpec> {
        let mut spec = ElementSpec::new(&self.path).hide_classes(self.hide_classes);
        if self.root {
            spec = spec.root();
        }
        if let Some(prefix) = &self.prefix {
            spec = spec.relocate(prefix.clone());
        }
        if let Some(id) = &self.id {
            spec = spec.id(id.clone());
        }
        for rename in &self.renames {
            let rule = Rename::new(&rename.from, &rename.to, rename.hide_classes)
                .with_context(|| format!("Invalid rename for {}", self.path.display()))?;
            spec = spec.rename(rule);
        }
        Ok(spec)
    }
}

/// `lib.jar=vendored.lib` or a bare `lib.jar`, which is inlined without relocation.
pub fn parse_inline(spec: &str) -> Result<(PathBuf, Option<String>)> {
    match spec.rsplit_once('=') {
        Some((path, prefix)) => {
            if path.is_empty() {
                anyhow::bail!("Missing archive path in --inline {spec:?}");
            }
            let prefix = prefix.trim();
            Ok((
                PathBuf::from(path),
                (!prefix.is_empty()).then(|| prefix.to_string()),
            ))
        }
        None => Ok((PathBuf::from(spec), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> InputArgs {
        InputArgs {
            config: None,
            root: None,
            inline: Vec::new(),
            hide_classes: false,
            fail_on_duplicate: false,
            stages: Vec::new(),
        }
    }

    #[test]
    fn parse_inline_splits_on_last_equals() {
        assert_eq!(
            parse_inline("libs/a=b.jar=vendored.a").unwrap(),
            (PathBuf::from("libs/a=b.jar"), Some("vendored.a".to_string()))
        );
        assert_eq!(parse_inline("lib.jar").unwrap(), (PathBuf::from("lib.jar"), None));
        assert_eq!(parse_inline("lib.jar=").unwrap(), (PathBuf::from("lib.jar"), None));
        assert!(parse_inline("=x").is_err());
    }

    #[test]
    fn load_resolves_relative_paths_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inline.json");
        std::fs::write(
            &path,
            r#"{
                "inputs": [
                    {"path": "app.jar", "root": true},
                    {"path": "lib.jar", "prefix": "vendored", "hide_classes": true,
                     "renames": [{"from": "org.extra", "to": "x.extra"}]}
                ],
                "output": "out/app.jar",
                "fail_on_duplicate": true
            }"#,
        )
        .unwrap();

        let config = InlineConfig::load(&path).unwrap();
        assert_eq!(config.inputs.len(), 2);
        assert_eq!(config.inputs[0].path, dir.path().join("app.jar"));
        assert_eq!(config.inputs[1].prefix.as_deref(), Some("vendored"));
        assert_eq!(config.inputs[1].renames[0].to, "x.extra");
        assert_eq!(config.output, Some(dir.path().join("out/app.jar")));
        assert!(config.fail_on_duplicate);
    }

    #[test]
    fn load_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inline.json");
        std::fs::write(&path, r#"{"inputz": []}"#).unwrap();
        assert!(InlineConfig::load(&path).is_err());
    }

    #[test]
    fn command_line_inputs_follow_the_root() {
        let mut a = args();
        a.root = Some(PathBuf::from("app.jar"));
        a.inline = vec!["lib.jar=vendored".to_string()];
        a.hide_classes = true;
        a.stages = vec!["strip-maven-metadata".to_string()];

        let mut config = InlineConfig {
            inputs: vec![InputConfig {
                path: PathBuf::from("other.jar"),
                ..InputConfig::default()
            }],
            ..InlineConfig::default()
        };
        config.merge_args(&a).unwrap();

        let paths: Vec<_> = config.inputs.iter().map(|i| i.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("app.jar"),
                PathBuf::from("other.jar"),
                PathBuf::from("lib.jar")
            ]
        );
        assert!(config.inputs[0].root);
        assert!(config.inputs[2].hide_classes);
        assert_eq!(config.transform_options().extra_stages, vec!["strip-maven-metadata"]);
    }

    #[test]
    fn validate_catches_bad_setups() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("a.jar");
        std::fs::write(&jar, b"").unwrap();
        let registry = StageRegistry::default();

        assert!(InlineConfig::default().validate(&registry).is_err());

        let root = InputConfig {
            path: jar.clone(),
            root: true,
            ..InputConfig::default()
        };
        let two_roots = InlineConfig {
            inputs: vec![root.clone(), root.clone()],
            ..InlineConfig::default()
        };
        assert!(two_roots.validate(&registry).is_err());

        let unknown_stage = InlineConfig {
            inputs: vec![root.clone()],
            extra_stages: vec!["nope".to_string()],
            ..InlineConfig::default()
        };
        assert!(unknown_stage.validate(&registry).is_err());

        let missing = InlineConfig {
            inputs: vec![InputConfig {
                path: dir.path().join("missing.jar"),
                ..InputConfig::default()
            }],
            ..InlineConfig::default()
        };
        assert!(missing.validate(&registry).is_err());

        let ok = InlineConfig {
            inputs: vec![root],
            ..InlineConfig::default()
        };
        ok.validate(&registry).unwrap();
        assert_eq!(ok.class_path().unwrap().len(), 1);
    }
}
