//! Batch generation of benchmark query files.
//!
//! Reads signal queries from a CSV, groups them by model and writes one SQL
//! file per model and sampling percentage:
//!
//! ```text
//! <output_dir>/model0/model0_<id>_10.sql
//! <output_dir>/model0/model0_<id>_20.sql
//! ...
//! ```
//!
//! Each file holds, per query, the `MATCH_RECOGNIZE` statement and the regex
//! statement over table `<prefix>.model<k>_<id>_<pct>`.

pub mod csv;
pub mod output;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{Config, TraceColumns};
use crate::error::{SigqlError, SigqlResult};
use crate::query::ToSql;
use crate::signal::SignalQuery;
use crate::translator::{Translation, Translator};

/// One CSV row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalRow {
    pub line: usize,
    pub model_id: String,
    pub signal_query: String,
}

/// A model's queries, numbered by first appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub number: usize,
    pub id: String,
    pub rows: Vec<SignalRow>,
}

impl Model {
    /// `model<k>_<id>_<pct>`
    pub fn dataset(&self, percentage: u32) -> String {
        format!("model{}_{}_{}", self.number, self.id, percentage)
    }

    /// `model<k>/model<k>_<id>_<pct>.sql`
    pub fn file_path(&self, percentage: u32) -> PathBuf {
        PathBuf::from(format!("model{}", self.number))
            .join(format!("{}.sql", self.dataset(percentage)))
    }
}

/// Group rows by `model_id`, keeping first-appearance order.
pub fn group_by_model(rows: Vec<SignalRow>) -> Vec<Model> {
    let mut models: Vec<Model> = Vec::new();
    for row in rows {
        match models.iter_mut().find(|m| m.id == row.model_id) {
            Some(model) => model.rows.push(row),
            None => models.push(Model {
                number: models.len(),
                id: row.model_id.clone(),
                rows: vec![row],
            }),
        }
    }
    models
}

/// `<prefix>.model<k>_<id>_<pct>`
pub fn table_name(prefix: &str, model: &Model, percentage: u32) -> String {
    if prefix.is_empty() {
        model.dataset(percentage)
    } else {
        format!("{}.{}", prefix, model.dataset(percentage))
    }
}

/// Render one file: both statements of every translated query.
pub fn render_file(translations: &[(usize, Translation)], table: &str, columns: &TraceColumns) -> String {
    let mut out = String::new();
    for (number, translation) in translations {
        let pair = translation.queries(*number, table, columns);
        out.push_str(&pair.match_recognize.to_sql());
        out.push_str("\n\n");
        out.push_str(&pair.regex.to_sql());
        out.push_str("\n\n");
    }
    out
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub models: usize,
    pub files: Vec<PathBuf>,
    pub translated: usize,
    /// Queries that could not be translated, tagged with their index.
    pub failures: Vec<SigqlError>,
}

/// Translate every query of a model. Failures are logged and returned
/// separately so the rest of the model is still written.
pub fn translate_model(
    model: &Model,
    translator: &Translator,
) -> (Vec<(usize, Translation)>, Vec<SigqlError>) {
    let mut translated = Vec::new();
    let mut failures = Vec::new();

    for (number, row) in model.rows.iter().enumerate() {
        let result = SignalQuery::parse(&row.signal_query)
            .and_then(|signal| translator.translate_signal(&signal));
        match result {
            Ok(translation) => translated.push((number, translation)),
            Err(e) => {
                let e = e.in_query(number, row.signal_query.trim());
                tracing::warn!("model{} ({}): {}", model.number, model.id, e);
                failures.push(e);
            }
        }
    }

    (translated, failures)
}

/// Run a batch from the configured CSV into the configured output directory.
pub fn generate(config: &Config, translator: &Translator) -> SigqlResult<BatchReport> {
    let batch = &config.batch;
    let source = fs::read_to_string(&batch.input).map_err(|e| {
        SigqlError::Config(format!("cannot read {}: {}", batch.input.display(), e))
    })?;
    let models = group_by_model(csv::read_signal_rows(&source)?);
    tracing::info!(
        "Loaded {} models from {}",
        models.len(),
        batch.input.display()
    );

    let mut report = BatchReport {
        models: models.len(),
        ..Default::default()
    };

    for model in &models {
        let (translations, failures) = translate_model(model, translator);
        report.translated += translations.len();
        report.failures.extend(failures);

        fs::create_dir_all(batch.output_dir.join(format!("model{}", model.number)))?;
        for &percentage in &batch.percentages {
            let table = table_name(&batch.table_prefix, model, percentage);
            let path = batch.output_dir.join(model.file_path(percentage));
            write_file(&path, &render_file(&translations, &table, &config.columns))?;
            report.files.push(path);
        }
        tracing::info!(
            "model{} ({}): {} queries, {} files",
            model.number,
            model.id,
            translations.len(),
            batch.percentages.len()
        );
    }

    Ok(report)
}

fn write_file(path: &Path, content: &str) -> SigqlResult<()> {
    tracing::debug!("Writing {}", path.display());
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(model_id: &str, query: &str) -> SignalRow {
        SignalRow {
            line: 0,
            model_id: model_id.to_string(),
            signal_query: query.to_string(),
        }
    }

    #[test]
    fn test_models_numbered_by_first_appearance() {
        let models = group_by_model(vec![
            row("p2p", "q0"),
            row("o2c", "q1"),
            row("p2p", "q2"),
        ]);
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, "p2p");
        assert_eq!(models[0].rows.len(), 2);
        assert_eq!(models[1].number, 1);
    }

    #[test]
    fn test_names() {
        let model = Model {
            number: 3,
            id: "abc".to_string(),
            rows: vec![],
        };
        assert_eq!(
            table_name("postgresql.public", &model, 40),
            "postgresql.public.model3_abc_40"
        );
        assert_eq!(table_name("", &model, 40), "model3_abc_40");
        assert_eq!(
            model.file_path(40),
            PathBuf::from("model3").join("model3_abc_40.sql")
        );
    }

    #[test]
    fn test_failures_keep_query_index() {
        let model = Model {
            number: 0,
            id: "m".to_string(),
            rows: vec![
                row("m", "MATCHES ( 'a' ~> 'b' )*"),
                row("m", "MATCHES NOT ( 'a'"),
                row("m", "EVENT_NAME = 'c'"),
            ],
        };
        let (translated, failures) = translate_model(&model, &Translator::default());
        assert_eq!(
            translated.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], SigqlError::Translation { query: 1, .. }));
    }

    #[test]
    fn test_render_file_pairs_statements() {
        let translation = Translator::default().translate("( 'a' ~> 'b' )*").unwrap();
        let text = render_file(&[(0, translation)], "t", &TraceColumns::default());
        let entries = output::parse_statements(&text);
        assert_eq!(entries.len(), 2);
        assert!(text.ends_with("\n\n"));
    }
}
