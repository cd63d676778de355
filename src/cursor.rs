use crate::{
    error::Result,
    node::LeafNode,
    pager::Pager,
    row::Row,
};

/// Position of a row in the table. Only lives as long as the statement using it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub page_num: u32,
    pub cell_num: u32,
    /// Indicates a position one past the last element.
    pub end_of_table: bool,
}

impl Cursor {
    pub fn new(page_num: u32, cell_num: u32) -> Self {
        Self {
            page_num,
            cell_num,
            end_of_table: false,
        }
    }

    pub fn table_start(pager: &mut Pager, root_page_num: u32) -> Result<Self> {
        let mut cursor = Self::new(root_page_num, 0);
        cursor.skip_empty(pager)?;
        Ok(cursor)
    }

    fn num_cells(&self, pager: &mut Pager) -> Result<u32> {
        let page = pager.get_page(self.page_num)?;
        let page = page.borrow();
        let node = LeafNode::new(&page.data[..])?;
        node.cell_count()
    }

    /// Moves forward until the cursor points at a cell or past the last page.
    fn skip_empty(&mut self, pager: &mut Pager) -> Result<()> {
        while self.cell_num >= self.num_cells(pager)? {
            if self.page_num + 1 >= pager.num_pages() {
                self.end_of_table = true;
                return Ok(());
            }
            self.page_num += 1;
            self.cell_num = 0;
        }
        Ok(())
    }

    pub fn value(&self, pager: &mut Pager) -> Result<Row> {
        let page = pager.get_page(self.page_num)?;
        let page = page.borrow();
        let node = LeafNode::new(&page.data[..])?;
        let (_, bytes) = node.read_cell(self.cell_num)?;
        Ok(Row::decode(bytes))
    }

    pub fn advance(&mut self, pager: &mut Pager) -> Result<()> {
        self.cell_num += 1;
        self.skip_empty(pager)
    }
}

/// Lazy full scan in ascending key order. Stops after the first error.
pub struct Rows<'a> {
    pager: &'a mut Pager,
    state: ScanState,
}

enum ScanState {
    Start { root_page_num: u32 },
    At(Cursor),
    Done,
}

impl<'a> Rows<'a> {
    pub(crate) fn new(pager: &'a mut Pager, root_page_num: u32) -> Self {
        Self {
            pager,
            state: ScanState::Start { root_page_num },
        }
    }

    fn next_row(&mut self, state: ScanState) -> Result<Option<(Row, Cursor)>> {
        let mut cursor = match state {
            ScanState::Start { root_page_num } => {
                Cursor::table_start(self.pager, root_page_num)?
            }
            ScanState::At(cursor) => cursor,
            ScanState::Done => return Ok(None),
        };
        if cursor.end_of_table {
            return Ok(None);
        }
        let row = cursor.value(self.pager)?;
        cursor.advance(self.pager)?;
        Ok(Some((row, cursor)))
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let state = std::mem::replace(&mut self.state, ScanState::Done);
        match self.next_row(state) {
            Ok(Some((row, cursor))) => {
                self.state = ScanState::At(cursor);
                Some(Ok(row))
            }
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::{Cursor, Rows};
    use crate::{constants::TABLE_MAX_PAGES, node::LeafNode, pager::Pager, row::Row};

    fn leaf_with(pager: &mut Pager, page_num: u32, rows: &[Row]) -> anyhow::Result<()> {
        let page = pager.get_page(page_num)?;
        let mut page = page.borrow_mut();
        let mut node = LeafNode::new(&mut page.data[..])?;
        node.initialize(page_num == 0);
        for row in rows {
            node.insert_cell(row.key(), &row.encode()?)?;
        }
        Ok(())
    }

    #[test]
    fn test_cursor_walks_pages() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new("rowdb")?;
        let mut pager = Pager::open(tmp_dir.path().join("my.db"), TABLE_MAX_PAGES)?;

        let r1 = Row::new(1, "a", "a@x")?;
        let r2 = Row::new(2, "b", "b@x")?;
        leaf_with(&mut pager, 0, &[r1.clone()])?;
        leaf_with(&mut pager, 1, &[r2.clone()])?;

        let mut cursor = Cursor::table_start(&mut pager, 0)?;
        assert_eq!(cursor.value(&mut pager)?, r1);
        cursor.advance(&mut pager)?;
        assert_eq!((cursor.page_num, cursor.cell_num), (1, 0));
        assert_eq!(cursor.value(&mut pager)?, r2);
        cursor.advance(&mut pager)?;
        assert!(cursor.end_of_table);

        pager.close()?;
        Ok(())
    }

    #[test]
    fn test_empty_table_start() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new("rowdb")?;
        let mut pager = Pager::open(tmp_dir.path().join("my.db"), TABLE_MAX_PAGES)?;
        leaf_with(&mut pager, 0, &[])?;

        let cursor = Cursor::table_start(&mut pager, 0)?;
        assert!(cursor.end_of_table);

        pager.close()?;
        Ok(())
    }

    #[test]
    fn test_rows_scan_every_page() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new("rowdb")?;
        let mut pager = Pager::open(tmp_dir.path().join("my.db"), TABLE_MAX_PAGES)?;

        let rows = vec![
            Row::new(1, "a", "a@x")?,
            Row::new(2, "b", "b@x")?,
            Row::new(3, "c", "c@x")?,
        ];
        leaf_with(&mut pager, 0, &rows[..2])?;
        leaf_with(&mut pager, 1, &rows[2..])?;

        let scanned = Rows::new(&mut pager, 0).collect::<Result<Vec<_>, _>>()?;
        assert_eq!(scanned, rows);

        pager.close()?;
        Ok(())
    }
}
