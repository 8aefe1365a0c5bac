//! Seed binary - loads reference data and optional sample translations
//!
//! Usage:
//!   cargo run --bin seed                                      # languages + tags
//!   cargo run --bin seed -- --languages-csv data/languages.csv
//!   cargo run --bin seed -- --translations 100000             # bulk sample rows
//!
//! Uses the same DATABASE_URL as the server.
//!
//! The CSV needs a header row with `Language` and `ISO Code` columns.
//! Languages are upserted on their code.

use anyhow::{bail, Context, Result};
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use translation_api::config::Config;
use translation_api::db::Database;
use translation_api::keys::derive_key;
use translation_api::models::{Language, TranslationFields};

const DEFAULT_LANGUAGES: [(&str, &str); 3] = [("en", "English"), ("fr", "French"), ("es", "Spanish")];
const DEFAULT_TAGS: [&str; 3] = ["mobile", "web", "desktop"];
const BATCH_SIZE: usize = 5000;

const WORDS: [&str; 16] = [
    "welcome", "login", "profile", "settings", "checkout", "cart", "search", "account",
    "banner", "footer", "header", "message", "button", "title", "error", "notice",
];

#[derive(Debug, Default, PartialEq)]
struct SeedArgs {
    languages_csv: Option<PathBuf>,
    translations: usize,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<SeedArgs> {
    let mut args = args.into_iter();
    let mut parsed = SeedArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--languages-csv" => {
                let path = args.next().context("--languages-csv requires a path")?;
                parsed.languages_csv = Some(PathBuf::from(path));
            }
            "--translations" => {
                let value = args.next().context("--translations requires a count")?;
                parsed.translations = value
                    .parse()
                    .context(format!("Invalid --translations value: {}", value))?;
            }
            other => bail!("Unknown argument: {}", other),
        }
    }

    Ok(parsed)
}

/// Read `(code, name)` pairs, skipping blank rows and repeated names
fn read_languages_csv<R: Read>(reader: R) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let name_index = headers
        .iter()
        .position(|h| h == "Language")
        .context("CSV is missing the 'Language' column")?;
    let code_index = headers
        .iter()
        .position(|h| h == "ISO Code")
        .context("CSV is missing the 'ISO Code' column")?;

    let mut seen_names = HashSet::new();
    let mut languages = Vec::new();

    for record in reader.records() {
        let record = record.context("Failed to read CSV record")?;
        let name = record.get(name_index).unwrap_or_default();
        let code = record.get(code_index).unwrap_or_default();

        if name.is_empty() || code.is_empty() || !seen_names.insert(name.to_string()) {
            continue;
        }
        languages.push((code.to_string(), name.to_string()));
    }

    Ok(languages)
}

/// Build `count` sample rows with unique derived keys
fn sample_rows(
    languages: &[Language],
    tag_ids: &[i64],
    start: usize,
    count: usize,
) -> Vec<(TranslationFields, Vec<i64>)> {
    if languages.is_empty() {
        return Vec::new();
    }

    let mut rng = rand::thread_rng();
    let mut rows = Vec::with_capacity(count);

    for n in start..start + count {
        let language = &languages[rng.gen_range(0..languages.len())];
        let suffix: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        let first = WORDS.choose(&mut rng).copied().unwrap_or("text");
        let second = WORDS.choose(&mut rng).copied().unwrap_or("item");
        let name = format!("{} {} {} {}", first, second, suffix, n);

        let tag_count = rng.gen_range(1..=tag_ids.len().clamp(1, 3));
        let picked: Vec<i64> = tag_ids
            .choose_multiple(&mut rng, tag_count)
            .copied()
            .collect();

        rows.push((
            TranslationFields {
                key: derive_key(&language.code, &name),
                content: format!("The {} {} text for {}.", first, second, language.name),
                locale: language.code.clone(),
                language_id: Some(language.id),
                tag: DEFAULT_TAGS.choose(&mut rng).map(|t| t.to_string()),
                name,
            },
            picked,
        ));
    }

    rows
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("seed=info".parse()?)
                .add_directive("translation_api=info".parse()?),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;

    for (code, name) in DEFAULT_LANGUAGES {
        db.upsert_language(code, name).await?;
    }
    for name in DEFAULT_TAGS {
        db.find_or_create_tag(name).await?;
    }
    info!(
        "✓ Seeded {} languages and {} tags",
        DEFAULT_LANGUAGES.len(),
        DEFAULT_TAGS.len()
    );

    if let Some(path) = &args.languages_csv {
        let file = File::open(path).context(format!("Failed to open {}", path.display()))?;
        let languages = read_languages_csv(file)?;
        for (code, name) in &languages {
            db.upsert_language(code, name).await?;
        }
        info!("✓ Imported {} languages from {}", languages.len(), path.display());
    }

    if args.translations > 0 {
        let languages = db.list_languages().await?;
        let tag_ids: Vec<i64> = db.list_tags().await?.into_iter().map(|t| t.id).collect();

        let mut inserted = 0;
        while inserted < args.translations {
            let chunk = BATCH_SIZE.min(args.translations - inserted);
            let rows = sample_rows(&languages, &tag_ids, inserted, chunk);
            db.insert_translations(&rows).await?;
            inserted += chunk;
            info!("Inserted {}/{} translations", inserted, args.translations);
        }
        info!("✓ Translation seeding done");
    }

    Ok(())
}
