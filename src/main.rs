//! cheburekdb - inspect and edit page store files

use anyhow::{Context, Result};
use cheburekdb::storage::{PageStore, Row, DEFAULT_PAGE_SIZE};
use clap::{Parser as ClapParser, Subcommand};
use std::path::{Path, PathBuf};

/// cheburekdb - a minimal on-disk page store
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new, empty database file
    Create {
        path: PathBuf,

        /// Size of every page slot in bytes
        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u16,
    },

    /// Append an empty page and print its number
    Allocate { path: PathBuf },

    /// Append a row to a page and write the page
    Insert {
        path: PathBuf,

        /// Page number (slot ordinal in the file)
        #[arg(short, long)]
        page: u32,

        /// Creating transaction id
        #[arg(long, default_value = "0")]
        xmin: u64,

        /// Deleting transaction id
        #[arg(long, default_value = "0")]
        xmax: u64,

        /// Row self-reference
        #[arg(long, default_value = "0")]
        ctid: u64,

        /// Row payload
        data: String,
    },

    /// Print every page and its rows
    Dump { path: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Command::Create { path, page_size } => {
            let store = PageStore::create(&path, page_size)
                .with_context(|| format!("Failed to create database: {:?}", path))?;
            store.close()?;
        }
        Command::Allocate { path } => {
            let mut store = open(&path)?;
            let id = store.allocate_page().context("Failed to allocate page")?;
            if let Some(page_no) = store.page_no(id) {
                println!("{page_no}");
            }
            store.close()?;
        }
        Command::Insert {
            path,
            page,
            xmin,
            xmax,
            ctid,
            data,
        } => {
            let mut store = open(&path)?;
            let id = store
                .page_by_no(page)
                .map(|p| p.id())
                .with_context(|| format!("Page {} does not exist", page))?;

            let row = Row {
                xmin,
                xmax,
                mask: 0,
                ctid,
                data: data.into_bytes(),
            };
            store.write_row(id, row)?;
            store
                .write_page(id)
                .with_context(|| format!("Failed to write page {}", page))?;
            store.close()?;
        }
        Command::Dump { path } => {
            let store = open(&path)?;
            dump(&store);
        }
    }

    Ok(())
}

fn open(path: &Path) -> Result<PageStore> {
    PageStore::open(path).with_context(|| format!("Failed to open database: {:?}", path))
}

fn dump(store: &PageStore) {
    println!(
        "{}: page size {}, {} pages",
        store.path().display(),
        store.page_size(),
        store.page_count()
    );

    for (page_no, page) in store.pages().iter().enumerate() {
        println!(
            "page {} (crc {:#010x}, {} rows, {}/{} bytes)",
            page_no,
            page.header().crc,
            page.row_count(),
            page.encoded_len(),
            store.page_size()
        );
        for (slot, (row, pointer)) in page.rows().iter().zip(page.row_pointers()).enumerate() {
            println!(
                "  [{}] off={} size={} xmin={} xmax={} ctid={} data={:?}",
                slot,
                pointer.offset,
                pointer.size,
                row.xmin,
                row.xmax,
                row.ctid,
                String::from_utf8_lossy(&row.data)
            );
        }
    }
}
