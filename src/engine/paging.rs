//! The backing store caps rows per request and predicate-list sizes.
//! These helpers hide both caps from callers: range-based pagination for
//! large result sets and chunked `eq_any` fetches for large id lists.

/// Rows requested per page when scanning a whole table or relation.
pub const PAGE_SIZE: i64 = 1000;

/// Upper bound on the number of ids placed in a single `eq_any` predicate.
pub const IN_LIST_CHUNK: usize = 200;

/// Repeatedly calls `fetch_page(offset, limit)` until a page comes back
/// shorter than `page_size`, concatenating pages in order. The short (or
/// empty) final page is included, so a result set of exactly
/// `n * page_size` rows costs `n + 1` requests. The first error aborts the
/// scan; rows accumulated so far are discarded.
pub fn fetch_paged<T, E, F>(page_size: i64, mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(i64, i64) -> Result<Vec<T>, E>,
{
    let mut rows = Vec::new();
    let mut offset = 0;
    loop {
        let page = fetch_page(offset, page_size)?;
        let page_len = page.len() as i64;
        rows.extend(page);
        if page_len < page_size {
            break;
        }
        offset += page_size;
    }
    Ok(rows)
}

/// Splits `items` into consecutive chunks of at most `chunk_size` and
/// calls `fetch_chunk` once per chunk, concatenating results in chunk
/// order. Empty input issues zero calls.
pub fn fetch_by_chunks<I, T, E, F>(
    items: &[I],
    chunk_size: usize,
    mut fetch_chunk: F,
) -> Result<Vec<T>, E>
where
    F: FnMut(&[I]) -> Result<Vec<T>, E>,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let mut rows = Vec::new();
    for chunk in items.chunks(chunk_size) {
        rows.extend(fetch_chunk(chunk)?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::{fetch_by_chunks, fetch_paged};

    fn numbered(total: i64) -> impl FnMut(i64, i64) -> Result<Vec<i64>, String> {
        move |offset, limit| {
            let end = (offset + limit).min(total);
            Ok((offset..end).collect())
        }
    }

    #[test]
    fn paged_fetch_walks_three_pages() {
        let mut calls = Vec::new();
        let mut source = numbered(2500);
        let rows = fetch_paged(1000, |offset, limit| {
            calls.push(offset);
            source(offset, limit)
        })
        .unwrap();

        assert_eq!(calls, vec![0, 1000, 2000]);
        assert_eq!(rows.len(), 2500);
        assert_eq!(rows.first(), Some(&0));
        assert_eq!(rows.last(), Some(&2499));
        // Original order survives concatenation.
        assert!(rows.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn exact_multiple_costs_one_trailing_empty_request() {
        let mut calls = 0;
        let mut source = numbered(1000);
        let rows = fetch_paged(1000, |offset, limit| {
            calls += 1;
            source(offset, limit)
        })
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(rows.len(), 1000);
    }

    #[test]
    fn empty_result_set_costs_a_single_request() {
        let mut calls = 0;
        let rows: Vec<i64> = fetch_paged(1000, |_, _| {
            calls += 1;
            Ok::<_, String>(Vec::new())
        })
        .unwrap();

        assert_eq!(calls, 1);
        assert!(rows.is_empty());
    }

    #[test]
    fn paged_fetch_aborts_on_first_error() {
        let mut calls = 0;
        let result: Result<Vec<i64>, String> = fetch_paged(10, |offset, _| {
            calls += 1;
            if offset >= 10 {
                Err("page failed".to_string())
            } else {
                Ok((0..10).collect())
            }
        });

        assert_eq!(result.unwrap_err(), "page failed");
        assert_eq!(calls, 2);
    }

    #[test]
    fn chunked_fetch_splits_450_ids_into_three_calls() {
        let ids: Vec<u32> = (0..450).collect();
        let mut sizes = Vec::new();
        let rows = fetch_by_chunks(&ids, 200, |chunk| {
            sizes.push(chunk.len());
            Ok::<_, String>(chunk.to_vec())
        })
        .unwrap();

        assert_eq!(sizes, vec![200, 200, 50]);
        assert_eq!(rows, ids);
    }

    #[test]
    fn chunked_fetch_over_empty_ids_issues_no_calls() {
        let ids: Vec<u32> = Vec::new();
        let mut calls = 0;
        let rows = fetch_by_chunks(&ids, 200, |chunk| {
            calls += 1;
            Ok::<_, String>(chunk.to_vec())
        })
        .unwrap();

        assert_eq!(calls, 0);
        assert!(rows.is_empty());
    }

    #[test]
    fn chunked_fetch_propagates_errors() {
        let ids: Vec<u32> = (0..300).collect();
        let mut calls = 0;
        let result: Result<Vec<u32>, String> = fetch_by_chunks(&ids, 200, |chunk| {
            calls += 1;
            if calls == 2 {
                Err("chunk failed".to_string())
            } else {
                Ok(chunk.to_vec())
            }
        });

        assert_eq!(result.unwrap_err(), "chunk failed");
        assert_eq!(calls, 2);
    }
}
