use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{Date, OffsetDateTime};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: BookId,
    #[serde(flatten)]
    pub info: BookInfo,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(rename = "__v", default)]
    pub revision: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BookId(pub String);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BookInfo {
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub isbn: String,
    pub description: String,
    pub copies: u32,
    pub available: bool,
    #[serde(
        rename = "imageUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(id) = self;
        write!(f, "{id}")
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Genre {
    Fiction,
    NonFiction,
    Science,
    History,
    Biography,
    Fantasy,
}

impl Genre {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fiction => "FICTION",
            Self::NonFiction => "NON_FICTION",
            Self::Science => "SCIENCE",
            Self::History => "HISTORY",
            Self::Biography => "BIOGRAPHY",
            Self::Fantasy => "FANTASY",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Genre {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "FICTION" => Ok(Self::Fiction),
            "NON_FICTION" => Ok(Self::NonFiction),
            "SCIENCE" => Ok(Self::Science),
            "HISTORY" => Ok(Self::History),
            "BIOGRAPHY" => Ok(Self::Biography),
            "FANTASY" => Ok(Self::Fantasy),
            _ => Err(format!("unrecognized genre {s:?}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("unrecognized sort order {s:?}")),
        }
    }
}

/// Listing filter. Absent fields stay out of the query string entirely,
/// which the server reads as "no filter"; limit 0 means unlimited.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BookSelection {
    pub genre: Option<Genre>,
    pub author: Option<String>,
    pub sort_by: Option<String>,
    pub sort: Option<SortOrder>,
    pub limit: u32,
}

impl BookSelection {
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(genre) = self.genre {
            params.push(("filter".to_owned(), genre.to_string()));
        }
        if let Some(author) = &self.author {
            if !author.trim().is_empty() {
                params.push(("author".to_owned(), author.clone()));
            }
        }
        if let Some(sort_by) = &self.sort_by {
            if !sort_by.trim().is_empty() {
                params.push(("sortBy".to_owned(), sort_by.clone()));
            }
        }
        if let Some(sort) = self.sort {
            params.push(("sort".to_owned(), sort.to_string()));
        }
        if self.limit > 0 {
            params.push(("limit".to_owned(), self.limit.to_string()));
        }
        params
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BorrowRequest {
    pub book: BookId,
    pub quantity: u32,
    #[serde(rename = "dueDate")]
    pub due_date: Date,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BorrowRecord {
    pub book: BorrowedBook,
    #[serde(rename = "totalQuantity")]
    pub total_quantity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BorrowedBook {
    pub title: String,
    pub isbn: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub success: bool,
    pub message: String,
}
