use crate::types::{CatalogFile, Persona, Scenario};
use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Read-only lookup of personas and scenarios by identifier.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    pub personas: BTreeMap<String, Persona>,
    pub scenarios: BTreeMap<String, Scenario>,
}

impl Catalog {
    pub fn insert_persona(&mut self, persona: Persona) {
        self.personas.insert(persona.id.clone(), persona);
    }

    pub fn insert_scenario(&mut self, scenario: Scenario) {
        self.scenarios.insert(scenario.id.clone(), scenario);
    }

    pub fn persona(&self, id: &str) -> Option<&Persona> {
        self.personas.get(id)
    }

    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    /// Later entries replace earlier ones with the same id.
    pub fn merge(&mut self, file: CatalogFile) {
        for p in file.personas {
            self.insert_persona(p);
        }
        for s in file.scenarios {
            self.insert_scenario(s);
        }
    }
}

pub fn load_catalog_file(path: impl AsRef<Path>) -> anyhow::Result<CatalogFile> {
    let path = path.as_ref();
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading catalog: {}", path.display()))?;
    let file: CatalogFile =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?;
    Ok(file)
}

/// Load every `.yml`/`.yaml` file of a directory, in file-name order, on top of `base`.
pub fn load_catalog_dir(base: Catalog, dir: impl AsRef<Path>) -> anyhow::Result<Catalog> {
    let mut catalog = base;
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "yml" || ext == "yaml" {
                entries.push(path);
            }
        }
    }
    entries.sort();
    for p in entries {
        let file = load_catalog_file(&p)?;
        tracing::debug!(
            "catalog file {}: {} personas, {} scenarios",
            p.display(),
            file.personas.len(),
            file.scenarios.len()
        );
        catalog.merge(file);
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let raw = r#"
scenarios:
  - id: refund
    title: Refund request
    tasks:
      - id: apologize
        text: Apologize
        matches: ["sorry", "извините"]
"#;
        let file: CatalogFile = serde_yaml::from_str(raw).unwrap();
        assert!(file.personas.is_empty());
        assert_eq!(file.scenarios[0].tasks[0].matches.len(), 2);
        assert_eq!(file.scenarios[0].tips, None);
    }

    #[test]
    fn merge_replaces_by_id() {
        let mut catalog = crate::builtin_catalog();
        let before = catalog.scenarios.len();
        let mut price = catalog.scenario("price").cloned().unwrap();
        price.title = "Custom".to_string();
        catalog.merge(CatalogFile {
            personas: vec![],
            scenarios: vec![price],
        });
        assert_eq!(catalog.scenarios.len(), before);
        assert_eq!(catalog.scenario("price").unwrap().title, "Custom");
    }
}
