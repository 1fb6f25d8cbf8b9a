//! One batch run: fetch → documents → index → answer → save → summary → email.
//!
//! Every step is best effort. A failure is logged, the step's output becomes
//! absent, and later steps carry on with what they have. Nothing here panics.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use tdx_ai::embeddings::Embedder;
use tdx_ai::index::{build_index, load_index, save_index, VectorIndex};
use tdx_ai::llm::Llm;
use tdx_ai::query::{QueryAnswer, QueryEngine};
use tdx_core::config::AppConfig;
use tdx_core::documents::{build_documents, describe_row};
use tdx_core::error::{AppError, ErrorKind};
use tdx_core::fetch::RowFetcher;
use tdx_core::notify::Mailer;
use tdx_core::report::{render_summary, SummaryStats};

/// What a [`Pipeline::run`] managed to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    /// `None` when the fetch itself failed.
    pub rows_fetched: Option<usize>,
    pub documents: usize,
    /// Index size, when a build succeeded.
    pub indexed: Option<usize>,
    pub answer: Option<String>,
    pub saved: bool,
    pub summary: Option<String>,
    pub emailed: bool,
}

pub struct Pipeline<'a> {
    config: &'a AppConfig,
    embedder: &'a dyn Embedder,
    llm: &'a dyn Llm,
    mailer: &'a dyn Mailer,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a AppConfig,
        embedder: &'a dyn Embedder,
        llm: &'a dyn Llm,
        mailer: &'a dyn Mailer,
    ) -> Self {
        Self {
            config,
            embedder,
            llm,
            mailer,
        }
    }

    fn engine(&self) -> QueryEngine<'a> {
        QueryEngine::new(
            self.embedder,
            self.llm,
            self.config.provider.completion_model.clone(),
            self.config.retrieval.top_k,
        )
    }

    pub fn run(&self) -> RunOutcome {
        let cfg = self.config;
        let mut outcome = RunOutcome::default();

        let fetcher = RowFetcher::new(&cfg.database);
        let rows = match fetcher.fetch(&cfg.database.table, None) {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, kind = %e.kind, "fetch failed; nothing to report");
                return outcome;
            }
        };
        outcome.rows_fetched = Some(rows.len());
        if rows.is_empty() {
            warn!(table = %cfg.database.table, "table returned no rows; nothing to report");
            return outcome;
        }
        info!(rows = rows.len(), columns = ?rows.columns(), "fetched source rows");

        let rows = rows.with_derived_column(&cfg.pipeline.text_column, |set, row| {
            describe_row(set, row, &cfg.columns)
        });

        let documents = build_documents(&rows, &cfg.pipeline.text_column);
        outcome.documents = documents.len();

        let index = match build_index(documents, self.embedder, &cfg.provider.embedding_model) {
            Ok(index) => Some(index),
            Err(e) => {
                error!(error = %e, kind = %e.kind, "index build failed");
                None
            }
        };
        outcome.indexed = index.as_ref().map(VectorIndex::len);

        outcome.answer = match self.engine().answer(index.as_ref(), &cfg.pipeline.question) {
            Ok(QueryAnswer { answer, sources }) => {
                info!(sources = sources.len(), "question answered");
                Some(answer)
            }
            Err(e) => {
                warn!(error = %e, kind = %e.kind, "no answer; continuing without one");
                None
            }
        };

        if let Some(index) = &index {
            outcome.saved = match self.save(index) {
                Ok(()) => true,
                Err(e) => {
                    error!(error = %e, "index save failed");
                    false
                }
            };
        }

        let stats = SummaryStats::compute(&rows, &cfg.columns);
        let summary = render_summary(&stats, outcome.answer.as_deref());

        outcome.emailed = match self
            .mailer
            .send(&cfg.email.recipient, &cfg.email.subject, &summary)
        {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, kind = %e.kind, "summary email not sent");
                false
            }
        };
        outcome.summary = Some(summary);

        info!(
            rows = outcome.rows_fetched,
            indexed = outcome.indexed,
            answered = outcome.answer.is_some(),
            saved = outcome.saved,
            emailed = outcome.emailed,
            "run finished"
        );
        outcome
    }

    fn save(&self, index: &VectorIndex) -> Result<(), AppError> {
        let updated_at = now_rfc3339_utc()?;
        save_index(index, &self.config.index.storage_dir, &updated_at)?;
        Ok(())
    }

    /// Answer `question` from the index persisted by an earlier run.
    pub fn ask(&self, question: &str) -> Result<QueryAnswer, AppError> {
        let index = load_index(&self.config.index.storage_dir)?;
        self.engine().answer(Some(&index), question)
    }
}

pub fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new(ErrorKind::Io, "TIME_FORMAT_FAILED", "Failed to format time")
            .with_details(e.to_string())
    })
}
