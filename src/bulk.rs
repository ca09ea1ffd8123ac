use crate::datasource::DataTable;
use crate::dispatch::OrderedCommit;
use crate::fragment::{Table, TableCell, TableRow};
use rayon::prelude::*;
use std::sync::{Mutex, PoisonError};

/// Renders `items` in `chunk_size` slices on the current rayon pool and
/// returns the rendered rows in original order.
///
/// Chunk fragments are committed by chunk index as soon as their
/// predecessors are in, regardless of completion order. At or below the
/// threshold the items render sequentially on the calling thread.
pub fn render_chunked<T, U, F>(items: &[T], chunk_size: usize, render_chunk: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(usize, &[T]) -> Vec<U> + Sync,
{
    let chunk_size = chunk_size.max(1);
    if items.len() <= chunk_size {
        return render_chunk(0, items);
    }

    let committed: Mutex<(OrderedCommit<Vec<U>>, Vec<U>)> =
        Mutex::new((OrderedCommit::new(), Vec::with_capacity(items.len())));
    items
        .par_chunks(chunk_size)
        .enumerate()
        .for_each(|(chunk_index, chunk)| {
            let rendered = render_chunk(chunk_index, chunk);
            let mut guard = committed.lock().unwrap_or_else(PoisonError::into_inner);
            let (commit, out) = &mut *guard;
            commit.accept(chunk_index, rendered, |_, rows| out.extend(rows));
        });

    let (commit, out) = committed.into_inner().unwrap_or_else(PoisonError::into_inner);
    debug_assert_eq!(commit.buffered(), 0);
    out
}

/// Bold header row plus one row per data record.
pub fn render_data_table(data: &DataTable, style: &str, chunk_size: usize) -> Table {
    let mut table = Table::new(style, data.columns.len());
    table.push_row(TableRow::new(
        data.columns.iter().map(TableCell::header).collect(),
    ));
    let rows = render_chunked(&data.rows, chunk_size, |_, chunk| {
        chunk.iter().map(|row| render_row(row, data.columns.len())).collect()
    });
    table.rows.extend(rows);
    table
}

fn render_row(values: &[String], columns: usize) -> TableRow {
    let mut cells: Vec<TableCell> = values.iter().take(columns).map(TableCell::text).collect();
    cells.resize_with(columns, || TableCell::text(""));
    TableRow::new(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pool(threads: usize) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("thread pool")
    }

    fn numbered_table(rows: usize) -> DataTable {
        DataTable::new(
            vec!["id".to_string(), "label".to_string()],
            (0..rows)
                .map(|i| vec![i.to_string(), format!("row-{i}")])
                .collect(),
        )
    }

    #[test]
    fn twelve_thousand_rows_keep_order_for_any_worker_count() {
        let data = numbered_table(12_000);
        for threads in [1, 3, 8] {
            let rows = pool(threads).install(|| {
                render_chunked(&data.rows, 1000, |chunk_index, chunk| {
                    // Scramble completion order: chunk 0 is slowest.
                    let delay = ((12 - chunk_index) * 7 % 5) as u64;
                    std::thread::sleep(Duration::from_millis(delay));
                    chunk.iter().map(|row| row[0].clone()).collect::<Vec<_>>()
                })
            });
            assert_eq!(rows.len(), 12_000, "row count with {threads} threads");
            assert!(
                rows.iter().enumerate().all(|(i, id)| *id == i.to_string()),
                "rows out of order with {threads} threads"
            );
        }
    }

    #[test]
    fn data_table_has_bold_header_and_all_rows() {
        let data = numbered_table(2_500);
        let table = pool(4).install(|| render_data_table(&data, "Light Grid", 1000));
        assert_eq!(table.style, "Light Grid");
        assert_eq!(table.columns, 2);
        assert_eq!(table.rows.len(), 2_501);
        assert!(table.rows[0].cells.iter().all(|cell| cell.runs[0].bold));
        assert!(!table.rows[1].cells[0].runs[0].bold);
        assert_eq!(table.rows[2_500].cells[1].plain_text(), "row-2499");
    }

    #[test]
    fn small_tables_render_sequentially_in_one_chunk() {
        let seen = Mutex::new(Vec::new());
        let rows = render_chunked(&[1, 2, 3], 10, |chunk_index, chunk| {
            seen.lock().expect("lock").push(chunk_index);
            chunk.to_vec()
        });
        assert_eq!(rows, vec![1, 2, 3]);
        assert_eq!(seen.into_inner().expect("lock"), vec![0]);
    }

    #[test]
    fn short_rows_are_padded_to_column_count() {
        let data = DataTable::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec!["only".to_string()]],
        );
        let table = render_data_table(&data, "Table Grid", 10);
        assert_eq!(table.rows[1].cells.len(), 2);
        assert_eq!(table.rows[1].cells[1].plain_text(), "");
    }
}
