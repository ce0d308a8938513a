use tracing::{debug, info};

use super::Scope;
use super::filter::RepoFilter;
use crate::github::paging::{ListQuery, Listing, OffsetPaginator, collect_pages};
use crate::github::{Fetcher, PipelineError};

/// `org/name` for every unarchived repository of `org` that passes `filter`.
pub async fn list_repo_names(
    fetcher: &Fetcher,
    org: &str,
    filter: &RepoFilter,
) -> Result<Vec<String>, PipelineError> {
    let scope = Scope::new("repository", org, "");
    let mut query = ListQuery::new(fetcher.per_page());
    query.repo_type = Some("all".to_string());

    let repos = collect_pages::<OffsetPaginator, _, _, _>(
        fetcher.cancel(),
        fetcher.policy(),
        Listing::repo("repos", "Repositories.ListByOrg", org, ""),
        &query,
        |req| fetcher.client().list_org_repos(org, req),
    )
    .await
    .map_err(|e| scope.listing_failed(e))?;

    let names: Vec<String> = repos
        .into_iter()
        .filter(|r| {
            if r.archived {
                debug!(repo = %r.name, "Skipping archived repository");
                return false;
            }
            filter.matches(org, &r.name)
        })
        .map(|r| format!("{org}/{}", r.name))
        .collect();

    info!(org, count = names.len(), "Listed repositories");
    Ok(names)
}
