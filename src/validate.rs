use std::fmt;
use std::result::Result as StdResult;
use time::{Date, Duration};

use crate::model::{Book, BookInfo, Genre};
use crate::probe::Verification;

pub const TITLE_LENGTH: (usize, usize) = (3, 80);
pub const AUTHOR_LENGTH: (usize, usize) = (3, 60);
pub const ISBN_LENGTH: (usize, usize) = (5, 20);
pub const DESCRIPTION_LENGTH: (usize, usize) = (15, 2000);
pub const MINIMUM_LOAN_DAYS: i64 = 5;

pub const INVALID_IMAGE_URL: &str = "Invalid image URL or image may not visible of this link";
pub const VERIFYING_IMAGE_URL: &str = "Verifying image URL";

pub fn check_quantity(quantity: u32, copies: u32) -> Option<String> {
    if quantity < 1 {
        Some("Copies should be at least 1".to_owned())
    } else if quantity > copies {
        Some("Copies should be at most total available books".to_owned())
    } else {
        None
    }
}

// Date-only comparison; callers truncate any time-of-day before handing
// in `today`.
pub fn check_due_date(due_date: Date, today: Date) -> Option<String> {
    let earliest = today.saturating_add(Duration::days(MINIMUM_LOAN_DAYS));
    if due_date < earliest {
        Some(format!(
            "Due date should be at least {MINIMUM_LOAN_DAYS} days from today"
        ))
    } else {
        None
    }
}

pub fn check_borrow(quantity: u32, copies: u32, due_date: Date, today: Date) -> BorrowCheck {
    BorrowCheck {
        quantity: check_quantity(quantity, copies),
        due_date: check_due_date(due_date, today),
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BorrowCheck {
    pub quantity: Option<String>,
    pub due_date: Option<String>,
}

impl BorrowCheck {
    pub fn is_ok(&self) -> bool {
        self.quantity.is_none() && self.due_date.is_none()
    }

    pub fn first(&self) -> Option<&str> {
        self.quantity
            .as_deref()
            .or(self.due_date.as_deref())
    }
}

impl fmt::Display for BorrowCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = [self.quantity.as_deref(), self.due_date.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Title,
    Author,
    Isbn,
    Description,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditCheck {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl EditCheck {
    pub fn is_ok(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.isbn.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
    }

    pub fn first(&self) -> Option<&str> {
        self.messages().next()
    }

    /// Every failure message, in field order.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        [
            self.title.as_deref(),
            self.author.as_deref(),
            self.isbn.as_deref(),
            self.description.as_deref(),
            self.image_url.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Working copy of a book under creation or edit. Keeps `available`
/// and `copies` consistent under both update directions.
#[derive(Clone, Debug, PartialEq)]
pub struct EditForm {
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub isbn: String,
    pub description: String,
    pub copies: u32,
    pub available: bool,
    pub image_url: Option<String>,
}

impl EditForm {
    pub fn blank() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            genre: Genre::Fiction,
            isbn: String::new(),
            description: String::new(),
            copies: 1,
            available: true,
            image_url: None,
        }
    }

    pub fn set_copies(&mut self, copies: u32) {
        self.copies = copies;
        self.available = copies > 0;
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
        self.copies = if available { 1 } else { 0 };
    }

    pub fn set_image_url(&mut self, url: &str) {
        let url = url.trim();
        self.image_url = if url.is_empty() {
            None
        } else {
            Some(url.to_owned())
        };
    }

    pub fn check_field(&self, field: Field) -> Option<String> {
        match field {
            Field::Title => check_length("Book Title", &self.title, TITLE_LENGTH),
            Field::Author => check_length("Author name", &self.author, AUTHOR_LENGTH),
            Field::Isbn => check_length("ISBN", &self.isbn, ISBN_LENGTH),
            Field::Description => {
                check_length("Description", &self.description, DESCRIPTION_LENGTH)
            }
        }
    }

    pub fn check(&self, image: Verification) -> EditCheck {
        EditCheck {
            title: self.check_field(Field::Title),
            author: self.check_field(Field::Author),
            isbn: self.check_field(Field::Isbn),
            description: self.check_field(Field::Description),
            image_url: self.check_image(image),
        }
    }

    fn check_image(&self, image: Verification) -> Option<String> {
        match (&self.image_url, image) {
            (None, _) => None,
            (Some(_), Verification::Verified) => None,
            (Some(_), Verification::Verifying) => Some(VERIFYING_IMAGE_URL.to_owned()),
            (Some(_), Verification::Failed) => Some(INVALID_IMAGE_URL.to_owned()),
            (Some(_), Verification::Untouched) => None,
        }
    }

    /// Gate in front of the create/update mutations. Text-field errors
    /// and an in-flight image check block the payload; a URL that never
    /// verified is stripped rather than sent.
    pub fn submit(&self, image: Verification) -> StdResult<BookInfo, EditCheck> {
        let check = self.check(image);
        let text_errors = check.title.is_some()
            || check.author.is_some()
            || check.isbn.is_some()
            || check.description.is_some();
        let verifying =
            self.image_url.is_some() && image == Verification::Verifying;
        if text_errors || verifying {
            return Err(check);
        }

        let image_url = match image {
            Verification::Verified => self.image_url.clone(),
            _ => None,
        };
        Ok(BookInfo {
            title: self.title.trim().to_owned(),
            author: self.author.trim().to_owned(),
            genre: self.genre,
            isbn: self.isbn.trim().to_owned(),
            description: self.description.trim().to_owned(),
            copies: self.copies,
            available: self.available,
            image_url,
        })
    }
}

impl From<&Book> for EditForm {
    fn from(book: &Book) -> Self {
        let info = &book.info;
        Self {
            title: info.title.clone(),
            author: info.author.clone(),
            genre: info.genre,
            isbn: info.isbn.clone(),
            description: info.description.clone(),
            copies: info.copies,
            available: info.available,
            image_url: info.image_url.clone(),
        }
    }
}

fn check_length(label: &str, value: &str, (min, max): (usize, usize)) -> Option<String> {
    let length = value.trim().chars().count();
    if length == 0 {
        Some(format!("{label} is required"))
    } else if length < min {
        Some(format!("{label} should be at least {min} characters"))
    } else if length > max {
        Some(format!("{label} should be at most {max} characters"))
    } else {
        None
    }
}
