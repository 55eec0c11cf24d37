//! Category data model and input validation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Label color, one of the dashboard's Tailwind palette classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryColor {
    #[serde(rename = "bg-red-500")]
    Red,
    #[serde(rename = "bg-blue-500")]
    Blue,
    #[serde(rename = "bg-green-500")]
    Green,
    #[serde(rename = "bg-yellow-500")]
    Yellow,
    #[serde(rename = "bg-purple-500")]
    Purple,
    #[serde(rename = "bg-pink-500")]
    Pink,
    #[serde(rename = "bg-gray-500")]
    Gray,
    #[serde(rename = "bg-orange-500")]
    Orange,
    #[serde(rename = "bg-cyan-500")]
    Cyan,
    #[serde(rename = "bg-teal-500")]
    Teal,
}

impl CategoryColor {
    pub const ALL: [CategoryColor; 10] = [
        CategoryColor::Red,
        CategoryColor::Blue,
        CategoryColor::Green,
        CategoryColor::Yellow,
        CategoryColor::Purple,
        CategoryColor::Pink,
        CategoryColor::Gray,
        CategoryColor::Orange,
        CategoryColor::Cyan,
        CategoryColor::Teal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryColor::Red => "bg-red-500",
            CategoryColor::Blue => "bg-blue-500",
            CategoryColor::Green => "bg-green-500",
            CategoryColor::Yellow => "bg-yellow-500",
            CategoryColor::Purple => "bg-purple-500",
            CategoryColor::Pink => "bg-pink-500",
            CategoryColor::Gray => "bg-gray-500",
            CategoryColor::Orange => "bg-orange-500",
            CategoryColor::Cyan => "bg-cyan-500",
            CategoryColor::Teal => "bg-teal-500",
        }
    }
}

impl fmt::Display for CategoryColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryColor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryColor::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::Invalid(format!("Unsupported color: {s}")))
    }
}

/// A user-owned label that mail can be filed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserCategory {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub color: CategoryColor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserCategory {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, color: CategoryColor) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into(),
            color,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Create-category request body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<CategoryColor>,
}

impl NewCategory {
    /// Trimmed name and color, or the first missing field.
    pub fn validate(&self) -> Result<(String, CategoryColor), ValidationError> {
        let name = clean_name(self.name.as_deref()).ok_or(ValidationError::Required("name"))?;
        let color = self.color.ok_or(ValidationError::Required("color"))?;
        Ok((name, color))
    }
}

/// Partial update for a category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<CategoryColor>,
}

impl CategoryPatch {
    /// Apply onto `category`. A present but blank name is rejected.
    pub fn apply(&self, category: &mut UserCategory) -> Result<(), ValidationError> {
        if let Some(raw) = self.name.as_deref() {
            category.name = clean_name(Some(raw)).ok_or(ValidationError::Required("name"))?;
        }
        if let Some(color) = self.color {
            category.color = color;
        }
        category.updated_at = Utc::now();
        Ok(())
    }
}

fn clean_name(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
