use anyhow::Result;
use clap::Parser;
use tabled::settings::Style;
use tabled::Table;

use carrel::model as domain;
use carrel::notify::{Notifier, Severity};
use carrel::probe::{HttpImageProbe, ImageProbe, Verification};
use carrel::search::search_titles;
use carrel::validate::{self, EditForm};
use carrel::{ApiClient, Catalog, Error};

pub mod import;
pub mod model;

#[derive(Parser)]
#[command(name = "carrel")]
#[command(about = "A lending catalog CLI")]
struct CliArgs {
    #[arg(long, help = "Base URL of the catalog API")]
    base_url: String,

    #[command(subcommand)]
    command: model::Command,
}

struct CirculationDesk(Catalog<ConsoleNotifier>);

impl CirculationDesk {
    fn new(catalog: Catalog<ConsoleNotifier>) -> Self {
        Self(catalog)
    }

    async fn dispatch(&self, command: model::Command) -> Result<()> {
        let Self(catalog) = self;
        match command {
            model::Command::List(args) => {
                print_books(&catalog.filtered_books(&args.into()).await?);
                Ok(())
            }
            model::Command::Sample { limit } => {
                print_books(&catalog.some_books(limit).await?);
                Ok(())
            }
            model::Command::Show { id } => {
                let book = catalog.book_by_id(&domain::BookId(id)).await?;
                println!("{}", model::BookCard(&book));
                if let Some(url) = &book.info.image_url {
                    if !HttpImageProbe::new().probe(url).await {
                        println!("(the cover URL did not load)");
                    }
                }
                Ok(())
            }
            model::Command::Create(draft) => {
                let info = settle_form(&draft.into_form()).await?;
                let book = catalog.create_book(&info).await?;
                println!("Created {} [{}]", book.info.title, book.id);
                Ok(())
            }
            model::Command::Edit(args) => {
                let id = domain::BookId(args.id.clone());
                let mut form = EditForm::from(&catalog.book_by_id(&id).await?);
                args.apply(&mut form);
                let info = settle_form(&form).await?;
                let book = catalog.update_book(&id, &info).await?;
                println!("Updated {} [{}]", book.info.title, book.id);
                Ok(())
            }
            model::Command::Delete { id, yes } => {
                if !yes {
                    println!("Pass --yes to really delete {id}.");
                    return Ok(());
                }
                let receipt = catalog.delete_book(&domain::BookId(id)).await?;
                println!("{}", receipt.message);
                Ok(())
            }
            model::Command::Borrow(model::BorrowArgs { id, quantity, due }) => {
                let book = catalog.book_by_id(&domain::BookId(id)).await?;
                let model::DueDate(due) = due;
                match catalog.borrow_book(&book, quantity, due).await {
                    Ok(message) => println!("{message}"),
                    // the notifier has already reported these
                    Err(Error::Validation(_)) => {}
                    Err(error) => return Err(error.into()),
                }
                Ok(())
            }
            model::Command::Summary => {
                let records = catalog.borrow_summary().await?;
                if records.is_empty() {
                    println!("No books are currently borrowed.");
                    return Ok(());
                }
                print_table(records.iter().map(model::SummaryRow::from));
                Ok(())
            }
            model::Command::Genres => {
                for genre in catalog.genres().await? {
                    println!("{genre}");
                }
                Ok(())
            }
            model::Command::Authors => {
                for author in catalog.authors().await? {
                    println!("{author}");
                }
                Ok(())
            }
            model::Command::Search { term, limit } => {
                let books = catalog.all_books().await?;
                let hits = search_titles(&books, &term, limit);
                if hits.is_empty() {
                    println!("Nothing in the catalog matches {term:?}.");
                }
                for hit in hits {
                    println!("{:>4}  {} [{}]", hit.score, hit.book.info.title, hit.book.id);
                }
                Ok(())
            }
            model::Command::Import { source } => import::from_source(catalog, source).await,
        }
    }
}

/// Probes the cover URL once, then runs the whole form through its
/// checks. A URL that does not load is dropped with a warning; text
/// errors abort the command.
async fn settle_form(form: &EditForm) -> Result<domain::BookInfo> {
    let verification = match &form.image_url {
        None => Verification::Untouched,
        Some(url) => {
            if HttpImageProbe::new().probe(url).await {
                Verification::Verified
            } else {
                eprintln!("warning: {}", validate::INVALID_IMAGE_URL);
                Verification::Failed
            }
        }
    };
    match form.submit(verification) {
        Ok(info) => Ok(info),
        Err(check) => {
            for message in check.messages() {
                eprintln!("error: {message}");
            }
            anyhow::bail!("the book details did not pass validation")
        }
    }
}

fn print_books(books: &[domain::Book]) {
    if books.is_empty() {
        println!("No books matched.");
        return;
    }
    print_table(books.iter().map(model::BookRow::from));
}

fn print_table<R>(rows: R)
where
    R: IntoIterator,
    R::Item: tabled::Tabled,
{
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => eprintln!("info: {message}"),
            Severity::Success => eprintln!("ok: {message}"),
            Severity::Warning => eprintln!("warning: {message}"),
            Severity::Error => eprintln!("error: {message}"),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = CliArgs::parse();
    let catalog = Catalog::with_notifier(ApiClient::new(&args.base_url), ConsoleNotifier);
    CirculationDesk::new(catalog)
        .dispatch(args.command)
        .await
        .expect("command dispatch failed");
}
