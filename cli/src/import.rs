use anyhow::{Context, Result};
use csv::ReaderBuilder;
use isbn::Isbn;
use serde::Deserialize;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
    str::FromStr,
};

use carrel::notify::Notifier;
use carrel::probe::{HttpImageProbe, ImageProbe, Verification};
use carrel::validate::EditForm;
use carrel::Catalog;

use super::domain;

/// Bulk-creates books from CSV rows. Rows that fail validation are
/// skipped and reported; network failures abort the whole run.
pub async fn from_source<N>(catalog: &Catalog<N>, source: ImportSource) -> Result<()>
where
    N: Notifier + 'static,
{
    let rows = read_csv_data(source.make_reader()?)?;
    let probe = HttpImageProbe::new();

    let mut created = 0usize;
    let mut skipped = 0usize;
    for (index, row) in rows.into_iter().enumerate() {
        let line = index + 1;
        match settle_row(&probe, row).await {
            Ok(info) => {
                let book = catalog.create_book(&info).await?;
                created += 1;
                println!("row {line}: created {} [{}]", book.info.title, book.id);
            }
            Err(reason) => {
                skipped += 1;
                eprintln!("row {line}: skipped: {reason}");
            }
        }
    }
    println!("Imported {created} books, skipped {skipped}.");
    Ok(())
}

#[derive(Clone)]
pub enum ImportSource {
    StdIn,
    FilePath(PathBuf),
}

impl ImportSource {
    fn make_reader(&self) -> Result<Box<dyn BufRead>> {
        Ok(match self {
            ImportSource::StdIn => Box::new(BufReader::new(io::stdin())),
            ImportSource::FilePath(path) => Box::new(BufReader::new(
                File::open(path).with_context(|| format!("opening {}", path.display()))?,
            )),
        })
    }
}

impl FromStr for ImportSource {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(if s == "-" {
            ImportSource::StdIn
        } else {
            ImportSource::FilePath(PathBuf::from_str(s)?)
        })
    }
}

// Checks one row the same way the edit form would: a cover URL that
// does not load is dropped, a malformed ISBN only warns.
async fn settle_row(probe: &HttpImageProbe, row: DataRow) -> Result<domain::BookInfo, String> {
    let DataRow {
        title,
        author,
        genre,
        isbn,
        description,
        copies,
        image_url,
    } = row;

    let mut form = EditForm::blank();
    form.title = title;
    form.author = author;
    form.genre = genre.parse()?;
    form.isbn = isbn;
    form.description = description;
    form.set_copies(copies);

    if form.isbn.parse::<Isbn>().is_err() {
        eprintln!(
            "warning: {:?} does not look like a valid ISBN; importing anyway",
            form.isbn
        );
    }

    let mut verification = Verification::Untouched;
    if let Some(url) = image_url {
        form.set_image_url(&url);
        if let Some(url) = &form.image_url {
            verification = if probe.probe(url).await {
                Verification::Verified
            } else {
                eprintln!("warning: dropping cover URL {url:?}; it did not load");
                Verification::Failed
            };
        }
    }

    form.submit(verification)
        .map_err(|check| check.messages().collect::<Vec<_>>().join("; "))
}

#[derive(Deserialize)]
pub struct DataRow {
    title: String,
    author: String,
    genre: String,
    isbn: String,
    description: String,
    #[serde(default = "one_copy")]
    copies: u32,
    #[serde(default)]
    image_url: Option<String>,
}

fn one_copy() -> u32 {
    1
}

fn read_csv_data<R>(reader: R) -> Result<Vec<DataRow>>
where
    R: BufRead,
{
    let mut data = vec![];
    let mut csv = ReaderBuilder::new().from_reader(reader);
    for row in csv.deserialize() {
        data.push(row?);
    }
    Ok(data)
}
