use clap::{Parser, Subcommand};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;
use time::macros::format_description;
use time::Date;

use carrel::validate::EditForm;

use super::domain;
use super::import::ImportSource;

#[derive(Subcommand)]
pub enum Command {
    List(ListArgs),
    Sample {
        #[arg(long, default_value_t = 6, help = "How many books to sample")]
        limit: u32,
    },
    Show {
        id: String,
    },
    Create(BookDraft),
    Edit(EditArgs),
    Delete {
        id: String,
        #[arg(long, help = "Really delete; without this nothing happens")]
        yes: bool,
    },
    Borrow(BorrowArgs),
    Summary,
    Genres,
    Authors,
    Search {
        term: String,
        #[arg(long, default_value_t = 10, help = "Most hits to show")]
        limit: usize,
    },
    Import {
        #[arg(help = "Path to a CSV file, or - for stdin")]
        source: ImportSource,
    },
}

#[derive(Parser)]
pub struct ListArgs {
    #[arg(long, help = "Only books of this genre")]
    pub genre: Option<domain::Genre>,

    #[arg(long, help = "Only books by this author")]
    pub author: Option<String>,

    #[arg(long, help = "Field to sort on, e.g. title or createdAt")]
    pub sort_by: Option<String>,

    #[arg(long, help = "asc or desc")]
    pub sort: Option<domain::SortOrder>,

    #[arg(long, default_value_t = 0, help = "At most this many books; 0 means all")]
    pub limit: u32,
}

impl From<ListArgs> for domain::BookSelection {
    fn from(
        ListArgs {
            genre,
            author,
            sort_by,
            sort,
            limit,
        }: ListArgs,
    ) -> Self {
        Self {
            genre,
            author,
            sort_by,
            sort,
            limit,
        }
    }
}

#[derive(Parser)]
pub struct BookDraft {
    #[arg(long, help = "Title of the book")]
    pub title: String,

    #[arg(long, help = "Name of the author")]
    pub author: String,

    #[arg(long, help = "One of the six catalog genres")]
    pub genre: domain::Genre,

    #[arg(long, help = "ISBN of the book")]
    pub isbn: String,

    #[arg(long, help = "A description of at least a sentence")]
    pub description: String,

    #[arg(long, default_value_t = 1, help = "Copies on the shelf")]
    pub copies: u32,

    #[arg(long, help = "URL of a cover image")]
    pub image_url: Option<String>,
}

impl BookDraft {
    pub fn into_form(self) -> EditForm {
        let Self {
            title,
            author,
            genre,
            isbn,
            description,
            copies,
            image_url,
        } = self;

        let mut form = EditForm::blank();
        form.title = title;
        form.author = author;
        form.genre = genre;
        form.isbn = isbn;
        form.description = description;
        form.set_copies(copies);
        if let Some(url) = image_url {
            form.set_image_url(&url);
        }
        form
    }
}

#[derive(Parser)]
pub struct EditArgs {
    pub id: String,

    #[arg(long, help = "New title")]
    pub title: Option<String>,

    #[arg(long, help = "New author name")]
    pub author: Option<String>,

    #[arg(long, help = "New genre")]
    pub genre: Option<domain::Genre>,

    #[arg(long, help = "New ISBN")]
    pub isbn: Option<String>,

    #[arg(long, help = "New description")]
    pub description: Option<String>,

    #[arg(long, help = "New number of copies; availability follows")]
    pub copies: Option<u32>,

    #[arg(long, help = "true or false; copies snap to 1 or 0")]
    pub available: Option<bool>,

    #[arg(long, help = "New cover URL; an empty value clears it")]
    pub image_url: Option<String>,
}

impl EditArgs {
    pub fn apply(&self, form: &mut EditForm) {
        if let Some(title) = &self.title {
            form.title = title.clone();
        }
        if let Some(author) = &self.author {
            form.author = author.clone();
        }
        if let Some(genre) = self.genre {
            form.genre = genre;
        }
        if let Some(isbn) = &self.isbn {
            form.isbn = isbn.clone();
        }
        if let Some(description) = &self.description {
            form.description = description.clone();
        }
        if let Some(copies) = self.copies {
            form.set_copies(copies);
        }
        if let Some(available) = self.available {
            form.set_available(available);
        }
        if let Some(url) = &self.image_url {
            form.set_image_url(url);
        }
    }
}

#[derive(Parser)]
pub struct BorrowArgs {
    pub id: String,

    #[arg(long, help = "How many copies to borrow")]
    pub quantity: u32,

    #[arg(long, help = "Due date as year-month-day, e.g. 2024-06-01")]
    pub due: DueDate,
}

#[derive(Clone, Copy)]
pub struct DueDate(pub Date);

impl FromStr for DueDate {
    type Err = time::error::Parse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = format_description!("[year]-[month]-[day]");
        Ok(Self(Date::parse(s, format)?))
    }
}

#[derive(Tabled)]
pub struct BookRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Title")]
    pub title: String,
    #[tabled(rename = "Author")]
    pub author: String,
    #[tabled(rename = "Genre")]
    pub genre: String,
    #[tabled(rename = "Copies")]
    pub copies: u32,
    #[tabled(rename = "Available")]
    pub available: &'static str,
}

impl From<&domain::Book> for BookRow {
    fn from(book: &domain::Book) -> Self {
        let domain::Book { id, info, .. } = book;
        let domain::BookInfo {
            title,
            author,
            genre,
            copies,
            available,
            ..
        } = info;
        Self {
            id: id.to_string(),
            title: title.clone(),
            author: author.clone(),
            genre: genre.to_string(),
            copies: *copies,
            available: if *available { "yes" } else { "no" },
        }
    }
}

#[derive(Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Title")]
    pub title: String,
    #[tabled(rename = "ISBN")]
    pub isbn: String,
    #[tabled(rename = "Borrowed")]
    pub borrowed: u32,
}

impl From<&domain::BorrowRecord> for SummaryRow {
    fn from(record: &domain::BorrowRecord) -> Self {
        let domain::BorrowRecord {
            book: domain::BorrowedBook { title, isbn },
            total_quantity,
        } = record;
        Self {
            title: title.clone(),
            isbn: isbn.clone(),
            borrowed: *total_quantity,
        }
    }
}

pub struct BookCard<'a>(pub &'a domain::Book);

impl fmt::Display for BookCard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(domain::Book {
            id,
            info:
                domain::BookInfo {
                    title,
                    author,
                    genre,
                    isbn,
                    description,
                    copies,
                    available,
                    image_url,
                },
            ..
        }) = self;

        writeln!(f, "{title}")?;
        writeln!(f, "{author} ({genre})")?;
        writeln!(f, "ISBN {isbn}")?;
        let shelf = if *available { "available" } else { "not available" };
        writeln!(f, "{copies} copies, {shelf}")?;
        if let Some(url) = image_url {
            writeln!(f, "Cover: {url}")?;
        }
        writeln!(f)?;
        writeln!(f, "{description}")?;
        write!(f, "[Book ID {id}]")
    }
}
