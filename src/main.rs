use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ignore::WalkBuilder;
use sidx::build::artifact::{ArtifactStatus, IndexArtifact};
use sidx::utils::{get_config_path, get_index_path, hash64, remove_index};
use sidx::{
    ArtifactProducer, DocumentSpec, IndexConfig, IndexManager, SearchContext, SearchIndexer,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sidx")]
#[command(about = "Fuzzy search index for document catalogs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or rebuild the index for a directory
    Build {
        /// Directory to index
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force full rebuild even if a stored index exists
        #[arg(short, long)]
        force: bool,
    },
    /// Search a previously built index
    Search {
        /// Query string (words, name:value filters, quotes, - and |)
        query: String,

        /// Directory the index was built for
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show index statistics
    Stats {
        /// Directory the index was built for
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Remove the stored index for a directory
    Remove {
        /// Directory the index was built for
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build { path, force } => build(&path, force),
        Commands::Search { query, path, limit } => search(&path, &query, limit),
        Commands::Stats { path } => stats(&path),
        Commands::Remove { path } => {
            let root = path.canonicalize().context("Invalid path")?;
            if remove_index(&root)? {
                println!("Removed index for: {}", root.display());
            } else {
                println!("No index for: {}", root.display());
            }
            Ok(())
        }
    }
}

/// Indexes plain files: words from the file name, extension and directory
/// properties, file size as a number. Content is hashed by (size, mtime) so
/// unchanged files are skipped on incremental updates.
struct FsProducer {
    root: PathBuf,
    config: IndexConfig,
}

impl ArtifactProducer for FsProducer {
    fn start(&self, _doc: &DocumentSpec) {}

    fn poll(&self, doc: &DocumentSpec) -> ArtifactStatus {
        let path = self.root.join(&doc.id);
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(err) => return ArtifactStatus::Failed(err.to_string()),
        };

        let mut index = SearchIndexer::new(&doc.id);
        index.start(true);
        let name = path.file_stem().and_then(|s| s.to_str()).map(str::to_string);
        let source = path
            .parent()
            .and_then(|p| p.strip_prefix(&self.root).ok())
            .map(|p| p.to_string_lossy().into_owned());
        let Some(slot) = index.add_document(&doc.id, name.as_deref(), source.as_deref(), true)
        else {
            return ArtifactStatus::Failed("document rejected".into());
        };

        if let Some(name) = &name {
            for word in tokenize(name) {
                index.add_word(
                    &word,
                    self.config.min_variations,
                    self.config.max_variations,
                    10,
                    slot,
                );
            }
        }
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            index.add_property(
                "ext",
                &ext.to_lowercase(),
                1,
                self.config.max_variations,
                0,
                slot,
                true,
                true,
            );
        }
        if let Some(dir) = &source {
            if !dir.is_empty() {
                index.add_property(
                    "dir",
                    &dir.to_lowercase(),
                    2,
                    self.config.max_variations,
                    5,
                    slot,
                    true,
                    false,
                );
            }
        }
        index.add_number("size", meta.len() as f64, 0, slot);
        index.finish(&[]);

        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let content_hash = hash64(&format!("{}:{}", meta.len(), mtime)) as u64;

        ArtifactStatus::Ready(Box::new(IndexArtifact {
            doc: doc.clone(),
            index,
            content_hash,
        }))
    }
}

fn tokenize(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn make_manager(root: &Path) -> Result<IndexManager> {
    let config = IndexConfig::load(&get_config_path()?)?;
    let producer = Arc::new(FsProducer {
        root: root.to_path_buf(),
        config: config.clone(),
    });
    let resolver_root = root.to_path_buf();
    let context = SearchContext {
        config,
        skip: None,
        resolver: Some(Arc::new(move |id: &str| {
            fs::read_to_string(resolver_root.join(id)).ok()
        })),
    };
    Ok(IndexManager::new("files", context, producer))
}

fn discover(root: &Path) -> Vec<DocumentSpec> {
    let mut docs = Vec::new();
    for entry in WalkBuilder::new(root).hidden(true).build().flatten() {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            docs.push(DocumentSpec::new(rel.to_string_lossy().into_owned()));
        }
    }
    docs
}

fn build(path: &Path, force: bool) -> Result<()> {
    let root = path.canonicalize().context("Invalid path")?;
    let index_path = get_index_path(&root)?;
    if force && index_path.exists() {
        fs::remove_file(&index_path).context("Failed to remove existing index")?;
    }

    let manager = make_manager(&root)?;
    let docs = discover(&root);
    println!("Indexing {} files in {}", docs.len(), root.display());

    run_build(&manager, docs)?;
    manager.save(&index_path)?;

    manager.with_index(|index| {
        println!(
            "Indexed {} documents, {} entries",
            index.document_count(),
            index.entry_count()
        );
    });
    Ok(())
}

#[cfg(feature = "progress")]
fn run_build(manager: &IndexManager, docs: Vec<DocumentSpec>) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use sidx::IndexEvent;

    let events = manager.subscribe();
    let total = docs.len() as u64;
    std::thread::scope(|scope| {
        scope.spawn(move || {
            let bar = ProgressBar::new(total);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            {
                bar.set_style(style);
            }
            for event in events {
                match event {
                    IndexEvent::Progress { resolved, .. } => bar.set_position(resolved as u64),
                    IndexEvent::Ready { .. } | IndexEvent::Failed(_) => break,
                }
            }
            bar.finish_and_clear();
        });
        manager.build(docs)
    })?;
    Ok(())
}

#[cfg(not(feature = "progress"))]
fn run_build(manager: &IndexManager, docs: Vec<DocumentSpec>) -> Result<()> {
    manager.build(docs)?;
    Ok(())
}

fn load_or_fail(path: &Path) -> Result<IndexManager> {
    let root = path.canonicalize().context("Invalid path")?;
    let manager = make_manager(&root)?;
    let index_path = get_index_path(&root)?;
    if !manager.load(&index_path)? {
        bail!(
            "No usable index for {} (run `sidx build` first)",
            root.display()
        );
    }
    Ok(manager)
}

fn search(path: &Path, query: &str, limit: usize) -> Result<()> {
    let manager = load_or_fail(path)?;
    let results = manager.search(query, i32::MAX, limit)?;

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for result in &results {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(stdout, "{}", result.id)?;
        stdout.set_color(ColorSpec::new().set_dimmed(true))?;
        writeln!(stdout, "  ({})", result.score)?;
        stdout.reset()?;
    }
    if results.is_empty() {
        println!("No matches");
    }
    Ok(())
}

fn stats(path: &Path) -> Result<()> {
    let manager = load_or_fail(path)?;
    manager.with_index(|index| {
        println!("Index:     {}", index.name());
        println!("Documents: {}", index.document_count());
        println!("Entries:   {}", index.entry_count());
        println!("Keywords:  {}", index.keywords().count());
        println!("Built at:  {} (unix)", index.timestamp());
    });
    Ok(())
}
