use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::{
    catalog::{CatalogClient, fetch_titles},
    csv,
    error::ShelfError,
    library::Library,
};

pub const CSV_HEADER: &str = "id,title";
const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub contents: String,
    pub rows: usize,
    /// Rows written without a title because the catalog lookup failed.
    pub untitled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// No favorites; no file should be written.
    NothingToExport,
    Exported(CsvExport),
    /// Every title lookup failed; the file carries identifiers only.
    TitlesUnavailable(CsvExport),
}

impl ExportOutcome {
    pub fn file(&self) -> Option<&CsvExport> {
        match self {
            ExportOutcome::NothingToExport => None,
            ExportOutcome::Exported(export) | ExportOutcome::TitlesUnavailable(export) => {
                Some(export)
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            ExportOutcome::NothingToExport => "No favorites to export.".to_string(),
            ExportOutcome::Exported(export) if export.untitled == 0 => {
                format!("Exported {} favorites.", export.rows)
            }
            ExportOutcome::Exported(export) => format!(
                "Exported {} favorites ({} without a title).",
                export.rows, export.untitled
            ),
            ExportOutcome::TitlesUnavailable(export) => format!(
                "Exported {} favorites by id only; titles could not be fetched.",
                export.rows
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Imported,
    AlreadyPresent,
    NothingUsable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: usize,
    pub already_present: usize,
    /// Rows that could not be read (bad quoting, empty id).
    pub skipped: usize,
}

impl ImportOutcome {
    pub fn status(&self) -> ImportStatus {
        if self.imported > 0 {
            ImportStatus::Imported
        } else if self.already_present > 0 {
            ImportStatus::AlreadyPresent
        } else {
            ImportStatus::NothingUsable
        }
    }

    pub fn message(&self) -> String {
        match self.status() {
            ImportStatus::Imported if self.already_present == 0 => {
                format!("Imported {} favorites.", self.imported)
            }
            ImportStatus::Imported => format!(
                "Imported {} favorites, {} were already saved.",
                self.imported, self.already_present
            ),
            ImportStatus::AlreadyPresent => format!(
                "Nothing new: all {} titles are already in favorites.",
                self.already_present
            ),
            ImportStatus::NothingUsable => "No titles found in the file.".to_string(),
        }
    }
}

/// Runs CSV exports and imports, one at a time.
#[derive(Default)]
pub struct Interchange {
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Interchange {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&self) -> Result<InFlight<'_>, ShelfError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| InFlight(&self.in_flight))
            .map_err(|_| ShelfError::InterchangeBusy)
    }

    /// Builds the favorites file, fetching display titles best effort.
    pub async fn export(
        &self,
        library: &Library,
        catalog: &impl CatalogClient,
    ) -> Result<ExportOutcome, ShelfError> {
        let _guard = self.begin()?;
        if library.favorites().is_empty() {
            return Ok(ExportOutcome::NothingToExport);
        }
        let ids = library.favorites().list();

        let titles = fetch_titles(catalog, &ids).await;
        let untitled = titles.iter().filter(|title| title.is_none()).count();
        let contents = build_csv(&ids, &titles);
        let export = CsvExport {
            contents,
            rows: ids.len(),
            untitled,
        };
        info!(rows = export.rows, untitled, "built favorites export");

        if untitled == ids.len() {
            warn!("no titles could be fetched, exporting ids only");
            Ok(ExportOutcome::TitlesUnavailable(export))
        } else {
            Ok(ExportOutcome::Exported(export))
        }
    }

    /// Adds every id in the file to favorites. Rows already imported stay
    /// imported if a later row is unreadable; a file without an `id` column
    /// changes nothing.
    pub fn import(&self, library: &mut Library, text: &str) -> Result<ImportOutcome, ShelfError> {
        let _guard = self.begin()?;
        let mut lines = csv::lines(text).skip_while(|line| line.trim().is_empty());

        let Some(header_line) = lines.next() else {
            return Ok(ImportOutcome::default());
        };
        let header = csv::parse_line(header_line).ok_or(ShelfError::MissingIdColumn)?;
        let id_index =
            csv::column_index(&header, ID_COLUMN).ok_or(ShelfError::MissingIdColumn)?;

        let mut outcome = ImportOutcome::default();
        for (row, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let id = csv::parse_line(line)
                .and_then(|fields| fields.into_iter().nth(id_index))
                .filter(|id| !id.trim().is_empty());
            let Some(id) = id else {
                debug!(row = row + 2, "skipping unreadable CSV row");
                outcome.skipped += 1;
                continue;
            };
            match library.add_favorite(&id) {
                Ok(true) => outcome.imported += 1,
                Ok(false) => outcome.already_present += 1,
                Err(err) => {
                    debug!(row = row + 2, error = %err, "skipping CSV row");
                    outcome.skipped += 1;
                }
            }
        }

        info!(
            imported = outcome.imported,
            already_present = outcome.already_present,
            skipped = outcome.skipped,
            "imported favorites file"
        );
        Ok(outcome)
    }
}

fn build_csv(ids: &[String], titles: &[Option<String>]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for (id, title) in ids.iter().zip(titles) {
        out.push_str(&csv::escape(id));
        out.push(',');
        out.push_str(&csv::quote_title(title.as_deref().unwrap_or_default()));
        out.push('\n');
    }
    out
}
