//! Hyperparameter grid domain types
//!
//! A grid is an ordered list of named parameters, each with a non-empty list
//! of candidate values. Enumerating the grid yields every combination, with
//! the last-declared parameter varying fastest.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// A single candidate value for a hyperparameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // Debug keeps the fractional part ("1.0" rather than "1")
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// One grid dimension
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Errors raised while building a grid
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("grid must declare at least one parameter")]
    NoParameters,

    #[error("parameter name cannot be empty")]
    EmptyName,

    #[error("parameter '{0}' is declared more than once")]
    DuplicateParameter(String),

    #[error("parameter '{0}' has no candidate values")]
    EmptyValues(String),

    #[error("grid has too many combinations to enumerate")]
    TooLarge,
}

/// Hyperparameter grid
///
/// Immutable once built. Every parameter has at least one value, so the grid
/// always enumerates at least one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperparameterGrid {
    parameters: Vec<Parameter>,
    size: usize,
}

impl HyperparameterGrid {
    /// Builds a grid, validating every dimension
    pub fn new(parameters: Vec<Parameter>) -> Result<Self, GridError> {
        if parameters.is_empty() {
            return Err(GridError::NoParameters);
        }

        let mut size: usize = 1;
        for (idx, param) in parameters.iter().enumerate() {
            if param.name.trim().is_empty() {
                return Err(GridError::EmptyName);
            }
            if parameters[..idx].iter().any(|p| p.name == param.name) {
                return Err(GridError::DuplicateParameter(param.name.clone()));
            }
            if param.values.is_empty() {
                return Err(GridError::EmptyValues(param.name.clone()));
            }
            size = size
                .checked_mul(param.values.len())
                .ok_or(GridError::TooLarge)?;
        }

        Ok(Self { parameters, size })
    }

    /// Builds a grid from `(name, values)` pairs in declaration order
    pub fn from_pairs<N, I>(pairs: I) -> Result<Self, GridError>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Vec<ParamValue>)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, values)| Parameter {
                    name: name.into(),
                    values,
                })
                .collect(),
        )
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Number of configurations the grid enumerates
    pub fn len(&self) -> usize {
        self.size
    }

    /// Always false: a valid grid has at least one configuration
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Lazily enumerates every configuration
    ///
    /// Each call starts a fresh pass over the grid in the same order.
    pub fn iter(&self) -> GridIter<'_> {
        GridIter {
            grid: self,
            cursor: Some(vec![0; self.parameters.len()]),
            remaining: self.size,
        }
    }
}

impl<'a> IntoIterator for &'a HyperparameterGrid {
    type Item = JobConfiguration;
    type IntoIter = GridIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'de> Deserialize<'de> for HyperparameterGrid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = deserializer.deserialize_map(OrderedEntries::<Vec<ParamValue>>::new())?;
        Self::from_pairs(entries).map_err(de::Error::custom)
    }
}

impl Serialize for HyperparameterGrid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.parameters.len()))?;
        for param in &self.parameters {
            map.serialize_entry(&param.name, &param.values)?;
        }
        map.end()
    }
}

/// Odometer-style iterator over a grid
///
/// The last index advances first and carries into earlier ones.
pub struct GridIter<'a> {
    grid: &'a HyperparameterGrid,
    cursor: Option<Vec<usize>>,
    remaining: usize,
}

impl Iterator for GridIter<'_> {
    type Item = JobConfiguration;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.cursor.as_mut()?;
        let params = &self.grid.parameters;

        let entries = params
            .iter()
            .zip(indices.iter())
            .map(|(param, &i)| (param.name.clone(), param.values[i]))
            .collect();

        let mut carried = true;
        for pos in (0..indices.len()).rev() {
            indices[pos] += 1;
            if indices[pos] < params[pos].values.len() {
                carried = false;
                break;
            }
            indices[pos] = 0;
        }
        if carried {
            self.cursor = None;
        }

        self.remaining -= 1;
        Some(JobConfiguration { entries })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for GridIter<'_> {}

/// One concrete assignment of every grid parameter
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfiguration {
    entries: Vec<(String, ParamValue)>,
}

impl JobConfiguration {
    pub fn new(entries: Vec<(String, ParamValue)>) -> Self {
        Self { entries }
    }

    /// Looks up the value assigned to a parameter
    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Iterates assignments in grid declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for JobConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl Serialize for JobConfiguration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for JobConfiguration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = deserializer.deserialize_map(OrderedEntries::<ParamValue>::new())?;
        Ok(Self { entries })
    }
}

/// Map visitor that keeps entries in document order
struct OrderedEntries<V>(PhantomData<V>);

impl<V> OrderedEntries<V> {
    fn new() -> Self {
        Self(PhantomData)
    }
}

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedEntries<V> {
    type Value = Vec<(String, V)>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of parameter names")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            entries.push((key, value));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ints(values: &[i64]) -> Vec<ParamValue> {
        values.iter().copied().map(ParamValue::Int).collect()
    }

    fn floats(values: &[f64]) -> Vec<ParamValue> {
        values.iter().copied().map(ParamValue::Float).collect()
    }

    fn sample_grid() -> HyperparameterGrid {
        HyperparameterGrid::from_pairs([
            ("n_estimators", ints(&[50, 100])),
            ("max_depth", ints(&[3, 5, 7])),
            ("learning_rate", floats(&[0.05, 0.1])),
        ])
        .unwrap()
    }

    #[test]
    fn test_enumerates_full_product_without_duplicates() {
        let grid = sample_grid();
        let configs: Vec<_> = grid.iter().collect();

        assert_eq!(grid.len(), 12);
        assert_eq!(configs.len(), 12);

        let unique: HashSet<String> = configs.iter().map(|c| c.to_string()).collect();
        assert_eq!(unique.len(), 12);
        assert!(configs.iter().all(|c| c.len() == 3));
    }

    #[test]
    fn test_last_parameter_varies_fastest() {
        let grid = sample_grid();
        let configs: Vec<_> = grid.iter().collect();

        assert_eq!(
            configs[0].to_string(),
            "n_estimators=50, max_depth=3, learning_rate=0.05"
        );
        assert_eq!(
            configs[1].to_string(),
            "n_estimators=50, max_depth=3, learning_rate=0.1"
        );
        assert_eq!(
            configs[2].to_string(),
            "n_estimators=50, max_depth=5, learning_rate=0.05"
        );
        assert_eq!(
            configs[11].to_string(),
            "n_estimators=100, max_depth=7, learning_rate=0.1"
        );
    }

    #[test]
    fn test_iteration_is_restartable() {
        let grid = sample_grid();
        let first: Vec<_> = grid.iter().collect();
        let second: Vec<_> = (&grid).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_exact_size_tracks_progress() {
        let grid = sample_grid();
        let mut iter = grid.iter();
        assert_eq!(iter.len(), 12);
        iter.next();
        iter.next();
        assert_eq!(iter.len(), 10);
    }

    #[test]
    fn test_single_point_grid() {
        let grid = HyperparameterGrid::from_pairs([("max_depth", ints(&[3]))]).unwrap();
        let configs: Vec<_> = grid.iter().collect();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].get("max_depth"), Some(ParamValue::Int(3)));
    }

    #[test]
    fn test_rejects_invalid_grids() {
        assert_eq!(
            HyperparameterGrid::new(vec![]).unwrap_err(),
            GridError::NoParameters
        );
        assert_eq!(
            HyperparameterGrid::from_pairs([("depth", vec![])]).unwrap_err(),
            GridError::EmptyValues("depth".to_string())
        );
        assert_eq!(
            HyperparameterGrid::from_pairs([("a", ints(&[1])), ("a", ints(&[2]))]).unwrap_err(),
            GridError::DuplicateParameter("a".to_string())
        );
        assert_eq!(
            HyperparameterGrid::from_pairs([(" ", ints(&[1]))]).unwrap_err(),
            GridError::EmptyName
        );
    }

    #[test]
    fn test_deserialize_preserves_declaration_order() {
        let json = r#"{"subsample": [0.8, 1.0], "n_estimators": [50, 100], "alpha": [1]}"#;
        let grid: HyperparameterGrid = serde_json::from_str(json).unwrap();

        let names: Vec<_> = grid.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["subsample", "n_estimators", "alpha"]);
        assert_eq!(grid.parameters()[1].values, ints(&[50, 100]));
        assert_eq!(grid.parameters()[0].values, floats(&[0.8, 1.0]));
    }

    #[test]
    fn test_deserialize_rejects_empty_list() {
        let json = r#"{"n_estimators": []}"#;
        assert!(serde_json::from_str::<HyperparameterGrid>(json).is_err());
    }

    #[test]
    fn test_param_value_display() {
        assert_eq!(ParamValue::Int(50).to_string(), "50");
        assert_eq!(ParamValue::Float(1.0).to_string(), "1.0");
        assert_eq!(ParamValue::Float(0.05).to_string(), "0.05");
    }

    #[test]
    fn test_configuration_serializes_in_order() {
        let grid = sample_grid();
        let config = grid.iter().next().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(
            json,
            r#"{"n_estimators":50,"max_depth":3,"learning_rate":0.05}"#
        );

        let back: JobConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
