//! Minimal end-to-end walkthrough of the embedded filesystem: open a
//! backing file, create a folder and a file inside it, write and read
//! content back, then list the tree and print a usage snapshot.

use clap::Parser;
use filecab::{EngineConfig, FileOps, FolderOps, Node};

#[derive(Parser)]
#[command(about = "Create and poke around a filecab-backed file")]
struct Args {
    /// Path to the backing file (created if it does not exist).
    backing_file: std::path::PathBuf,

    /// Defragmentation efficiency threshold, e.g. 0.4.
    #[arg(long, default_value_t = 0.4)]
    defrag_threshold: f64,
}

#[tokio::main]
async fn main() -> Result<(), filecab::EngineError> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let fs = filecab::Fs::open_with_config(
        args.backing_file,
        EngineConfig { defrag_threshold: args.defrag_threshold },
    );

    let root = fs.root();
    let notes = match root.child_folder("notes").await {
        Ok(existing) => existing,
        Err(_) => root.create_folder("notes").await?,
    };

    let todo = match notes.child_file("todo.txt").await {
        Ok(existing) => existing,
        Err(_) => notes.create_file("todo.txt").await?,
    };
    todo.write(b"buy milk\nwrite more tests\n").await?;

    println!("{} = {:?}", todo.absolute_path(), String::from_utf8_lossy(&todo.read().await?));

    for entry in root.list_folder().await? {
        println!("/{}", entry.name());
    }

    let stat = fs.stat().await?;
    println!(
        "backing file: {} bytes, {} live, {:.1}% efficient",
        stat.backing_file_bytes,
        stat.live_bytes,
        stat.efficiency * 100.0
    );

    Ok(())
}
