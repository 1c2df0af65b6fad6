use crate::context::FetchContext;
use crate::error::Result;
use crate::Page;
use std::collections::HashSet;
use std::future::Future;

/// Follow `next_link` until the listing is exhausted.
///
/// A failure on the first page is returned as-is. A failure after at least one
/// page succeeded stops paging and returns what was collected so far. A
/// `next_link` that was already requested ends the listing.
pub async fn collect_pages<T, F, Fut>(
    ctx: &FetchContext,
    resource: &str,
    mut fetch_page: F,
) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut next_link: Option<String> = None;
    let mut pages = 0usize;
    let mut requested: HashSet<String> = HashSet::new();

    loop {
        if let Some(link) = next_link.as_ref() {
            requested.insert(link.clone());
        }
        match ctx.run(fetch_page(next_link.take())).await {
            Ok(page) => {
                pages += 1;
                items.extend(page.items);
                match page.next_link {
                    Some(link) if !link.is_empty() && !requested.contains(&link) => {
                        next_link = Some(link);
                    }
                    Some(link) if !link.is_empty() => {
                        tracing::warn!(resource, pages, link = %link, "Paging cycle detected");
                        break;
                    }
                    _ => break,
                }
            }
            Err(e) if pages == 0 => return Err(e),
            Err(e) => {
                tracing::warn!(
                    resource,
                    pages,
                    collected = items.len(),
                    error = %e,
                    "Page fetch failed, keeping partial result"
                );
                break;
            }
        }
    }

    tracing::debug!(resource, pages, count = items.len(), "Listing complete");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloudError;
    use std::time::Duration;

    fn ctx() -> FetchContext {
        FetchContext::with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn should_return_empty_result_when_listing_has_no_items() {
        let items: Vec<u32> = collect_pages(&ctx(), "test", |_| async { Ok(Page::last(vec![])) })
            .await
            .expect("empty listing is not an error");
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn should_follow_next_links_until_exhausted() {
        let items = collect_pages(&ctx(), "test", |link| async move {
            Ok(match link.as_deref() {
                None => Page {
                    items: vec![1, 2],
                    next_link: Some("p2".to_string()),
                },
                Some("p2") => Page {
                    items: vec![3],
                    next_link: Some("p3".to_string()),
                },
                _ => Page::last(vec![4]),
            })
        })
        .await
        .expect("pages");
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn should_fail_when_first_page_fails() {
        let res: Result<Vec<u32>> = collect_pages(&ctx(), "test", |_| async {
            Err(CloudError::RemoteApi {
                status: 403,
                code: "AuthorizationFailed".to_string(),
                message: "denied".to_string(),
            })
        })
        .await;
        assert!(matches!(res, Err(CloudError::RemoteApi { status: 403, .. })));
    }

    #[tokio::test]
    async fn should_keep_partial_result_when_later_page_fails() {
        let items = collect_pages(&ctx(), "test", |link| async move {
            match link {
                None => Ok(Page {
                    items: vec![1, 2],
                    next_link: Some("p2".to_string()),
                }),
                Some(_) => Err(CloudError::RemoteApi {
                    status: 500,
                    code: "InternalError".to_string(),
                    message: "boom".to_string(),
                }),
            }
        })
        .await
        .expect("partial result is not an error");
        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn should_stop_when_next_link_repeats() {
        let items = collect_pages(&ctx(), "test", |_| async {
            Ok(Page {
                items: vec![7],
                next_link: Some("same".to_string()),
            })
        })
        .await
        .expect("pages");
        assert_eq!(items, vec![7, 7]);
    }

    #[tokio::test]
    async fn should_stop_when_next_links_form_a_cycle() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let items = collect_pages(&ctx(), "test", |link| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                Ok(match link.as_deref() {
                    None => Page {
                        items: vec![1],
                        next_link: Some("a".to_string()),
                    },
                    Some("a") => Page {
                        items: vec![2],
                        next_link: Some("b".to_string()),
                    },
                    _ => Page {
                        items: vec![3],
                        next_link: Some("a".to_string()),
                    },
                })
            }
        })
        .await
        .expect("pages");
        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
