//! Grid file loading
//!
//! A grid file maps each hyperparameter to its list of values:
//!
//! ```yaml
//! n_estimators: [50, 100, 200]
//! max_depth: [3, 5]
//! learning_rate: [0.05, 0.1]
//! ```
//!
//! `.json` files are read as JSON, everything else as YAML. Declaration order
//! is kept, so the last parameter varies fastest.

use anyhow::{Context, Result};
use gridsweep_core::domain::grid::HyperparameterGrid;
use std::path::Path;

pub async fn load_grid(path: &Path) -> Result<HyperparameterGrid> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read grid file {}", path.display()))?;

    parse_grid(&content, is_json(path))
        .with_context(|| format!("Invalid grid file {}", path.display()))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn parse_grid(content: &str, json: bool) -> Result<HyperparameterGrid> {
    let grid = if json {
        serde_json::from_str(content)?
    } else {
        serde_yaml::from_str(content)?
    };
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsweep_core::domain::grid::ParamValue;

    #[test]
    fn test_parses_yaml_in_declaration_order() {
        let grid = parse_grid(
            "n_estimators: [50, 100]\nmax_depth: [3]\nlearning_rate: [0.05, 0.1]\n",
            false,
        )
        .unwrap();

        let names: Vec<_> = grid.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["n_estimators", "max_depth", "learning_rate"]);
        assert_eq!(grid.len(), 4);
        assert_eq!(
            grid.parameters()[2].values,
            vec![ParamValue::Float(0.05), ParamValue::Float(0.1)]
        );
    }

    #[test]
    fn test_rejects_empty_value_list() {
        assert!(parse_grid(r#"{"max_depth": []}"#, true).is_err());
    }

    #[tokio::test]
    async fn test_loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.json");
        tokio::fs::write(&path, r#"{"max_depth": [3, 5], "subsample": [0.8]}"#)
            .await
            .unwrap();

        let grid = load_grid(&path).await.unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.parameters()[0].name, "max_depth");
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let err = load_grid(Path::new("/nonexistent/grid.yaml")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read grid file"));
    }
}
