//! Data-quality taxonomy.
//!
//! Grades are ordered by strictness: rank 1 is the best grade. A threshold
//! filter "at least as good as X" keeps every grade whose order is `<= order(X)`.
//! Weights scale each observation's contribution to aggregate statistics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QualityGrade {
    pub id: i64,
    pub name: String,
    pub weight: f64,
    pub order: i64,
}

impl QualityGrade {
    pub fn new(id: i64, name: &str, weight: f64, order: i64) -> Self {
        Self {
            id,
            name: name.to_owned(),
            weight,
            order,
        }
    }
}

/// Immutable lookup over the seeded grades, built once at startup and shared.
#[derive(Debug, Clone)]
pub struct QualityTable {
    grades: Vec<QualityGrade>,
    by_name: HashMap<String, usize>,
}

impl QualityTable {
    /// The canonical grades written by the loader.
    pub fn seeded() -> Self {
        let grades = vec![
            QualityGrade::new(1, "excellent", 1.0, 1),
            QualityGrade::new(2, "good", 0.8, 2),
            QualityGrade::new(3, "questionable", 0.5, 3),
            QualityGrade::new(4, "poor", 0.3, 4),
        ];
        let by_name = grades
            .iter()
            .enumerate()
            .map(|(index, grade)| (grade.name.clone(), index))
            .collect();
        Self { grades, by_name }
    }

    pub fn from_grades(mut grades: Vec<QualityGrade>) -> Result<Self, Error> {
        grades.sort_by_key(|grade| grade.order);

        let mut by_name = HashMap::with_capacity(grades.len());
        for (index, grade) in grades.iter().enumerate() {
            if !grade.weight.is_finite() || !(0.0..=1.0).contains(&grade.weight) {
                return Err(Error::InvalidGrade(format!(
                    "grade `{}` has weight {} outside [0, 1]",
                    grade.name, grade.weight
                )));
            }
            if by_name.insert(grade.name.clone(), index).is_some() {
                let matches = grades.iter().filter(|g| g.name == grade.name).count();
                return Err(Error::AmbiguousFilter {
                    filter: "quality_threshold",
                    value: grade.name.clone(),
                    matches,
                });
            }
        }

        Ok(Self { grades, by_name })
    }

    /// Rank of the named grade, `None` when no such grade exists.
    pub fn resolve_order(&self, name: &str) -> Option<i64> {
        self.get(name).map(|grade| grade.order)
    }

    pub fn weight(&self, name: &str) -> Option<f64> {
        self.get(name).map(|grade| grade.weight)
    }

    pub fn get(&self, name: &str) -> Option<&QualityGrade> {
        self.by_name.get(name).map(|index| &self.grades[*index])
    }

    /// Grades ordered best first.
    pub fn grades(&self) -> &[QualityGrade] {
        &self.grades
    }

    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }
}

impl Default for QualityTable {
    fn default() -> Self {
        Self::seeded()
    }
}
