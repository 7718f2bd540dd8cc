//! Maps a local name (and optional ordinal) to a child catalog key.
//!
//! Order, first hit wins:
//! 1. sub-numbered names ("E12.5", "E12B") drop any positional ordinal;
//! 2. ordinal lookup against the catalog-native ordinal field;
//! 3. case-sensitive title substring, first in ingest order;
//! 4. `NoMatch`.
//!
//! Store failures surface as `StoreError` and are never folded into `NoMatch`.

use tracing::debug;

use scrapefin_core::store::ChildStore;
use scrapefin_core::types::ordinal_token;
use scrapefin_core::{
    CatalogKey, Episodes, Level, ResolutionQuery, ResolutionResult, Seasons, StoreError,
};

use scrapefin_scanner::patterns::{Extraction, OrdinalPatterns};

#[derive(Default)]
pub struct IdentifierResolver {
    patterns: OrdinalPatterns,
}

impl IdentifierResolver {
    pub fn new(patterns: OrdinalPatterns) -> Self {
        Self { patterns }
    }

    /// Ordinal to look up for `name`: the supplied one, else one extracted
    /// from the name. `None` when the name is sub-numbered.
    pub fn usable_ordinal(&self, name: &str, supplied: Option<u32>) -> Option<u32> {
        match self.patterns.evaluate(name) {
            Extraction::SubNumbered => None,
            Extraction::Ordinal(extracted) => supplied.or(Some(extracted)),
            Extraction::Nothing => supplied,
        }
    }

    /// Generic child resolution with the full pattern set applied.
    pub async fn resolve_child<L: Level>(
        &self,
        store: &dyn ChildStore<L>,
        query: &ResolutionQuery<L::Parent>,
    ) -> Result<ResolutionResult<L::Child>, StoreError> {
        let ordinal = self.usable_ordinal(&query.candidate_name, query.candidate_ordinal);
        if ordinal.is_none() && query.candidate_ordinal.is_some() {
            debug!(
                parent = %query.parent,
                name = %query.candidate_name,
                "sub-numbered name, ignoring ordinal"
            );
        }

        if let Some(ordinal) = ordinal {
            let token = ordinal_token(ordinal);
            if let Some(key) = store
                .find_by_ordinal(&query.parent, &query.language, &token)
                .await?
            {
                return Ok(ResolutionResult::exact(key));
            }
        }

        self.resolve_by_name(store, query).await
    }

    pub async fn resolve_episode(
        &self,
        store: &dyn ChildStore<Episodes>,
        query: &ResolutionQuery<<Episodes as Level>::Parent>,
    ) -> Result<ResolutionResult<<Episodes as Level>::Child>, StoreError> {
        let result = self.resolve_child(store, query).await?;
        log_result("episode", &query.candidate_name, &result);
        Ok(result)
    }

    /// Seasons are matched on the supplied season number only; the episode
    /// token patterns do not apply to folder names.
    ///
    /// With a duplicate ordinal, the seasons sharing that number are taken in
    /// ingest order and the n-th (1-based) is returned. The scan runs over the
    /// same candidate set the direct lookup uses. A missing n-th season is
    /// `NoMatch`; the title fallback would hand back a sibling.
    pub async fn resolve_season(
        &self,
        store: &dyn ChildStore<Seasons>,
        query: &ResolutionQuery<<Seasons as Level>::Parent>,
    ) -> Result<ResolutionResult<<Seasons as Level>::Child>, StoreError> {
        let result = match (query.candidate_ordinal, query.duplicate_ordinal) {
            (Some(number), Some(duplicate)) if duplicate > 0 => {
                let token = ordinal_token(number);
                let hit = store
                    .list_children(&query.parent, &query.language)
                    .await?
                    .into_iter()
                    .filter(|season| season.ordinal.as_deref() == Some(token.as_str()))
                    .nth(duplicate as usize - 1);
                hit.map(|season| ResolutionResult::exact(season.key))
                    .unwrap_or_else(ResolutionResult::no_match)
            }
            (Some(number), _) => {
                let token = ordinal_token(number);
                match store
                    .find_by_ordinal(&query.parent, &query.language, &token)
                    .await?
                {
                    Some(key) => ResolutionResult::exact(key),
                    None => self.resolve_by_name(store, query).await?,
                }
            }
            (None, _) => self.resolve_by_name(store, query).await?,
        };

        log_result("season", &query.candidate_name, &result);
        Ok(result)
    }

    async fn resolve_by_name<L: Level>(
        &self,
        store: &dyn ChildStore<L>,
        query: &ResolutionQuery<L::Parent>,
    ) -> Result<ResolutionResult<L::Child>, StoreError> {
        // An empty needle would match every title.
        if query.candidate_name.trim().is_empty() {
            return Ok(ResolutionResult::no_match());
        }

        Ok(store
            .find_by_name_substring(&query.parent, &query.language, &query.candidate_name)
            .await?
            .map(ResolutionResult::by_name)
            .unwrap_or_else(ResolutionResult::no_match))
    }
}

fn log_result<K: CatalogKey>(kind: &str, name: &str, result: &ResolutionResult<K>) {
    match &result.matched {
        Some(key) => debug!(kind, name, key = %key, confidence = %result.confidence, "resolved"),
        None => debug!(kind, name, "no catalog match"),
    }
}
