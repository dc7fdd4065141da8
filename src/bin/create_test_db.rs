use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::OffsetDateTime;

use household_ledger::{
    family::{FamilyRole, add_family_member, create_family},
    initialize_db,
    user::create_user,
};

/// A utility for creating a test database for the household_ledger API server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
///
/// The database holds two users that share a family, so requests can be made
/// with `x-user-id: 1` or `x-user-id: 2`.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    if output_path.extension().is_none_or(|extension| extension.is_empty()) {
        eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
        exit(1);
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test users and family...");

    let now = OffsetDateTime::now_utc();
    let alice = create_user("Alice Test", None, "alice@example.com", &conn)?;
    let bob = create_user("Bob Test", None, "bob@example.com", &conn)?;
    let family = create_family("Test Family", alice.id, now, &conn)?;
    add_family_member(family.id, bob.id, FamilyRole::Member, now, &conn)?;

    println!("Success!");

    Ok(())
}
