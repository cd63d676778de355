use std::{
    fmt,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    constants::{
        COMMON_NODE_HEADER_SIZE, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_MAX_CELLS,
        LEAF_NODE_SPACE_FOR_CELLS, ROW_SIZE, TABLE_MAX_PAGES,
    },
    cursor::{Cursor, Rows},
    error::{Error, Result},
    node::{LeafNode, NodeType},
    pager::Pager,
    row::Row,
};

/// TableBuilder is a Builder for the Table struct.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    /// Path to the database file.
    path: PathBuf,
    /// Upper bound on the pages the table may use; fixes its row capacity.
    max_pages: usize,
}

impl TableBuilder {
    pub fn new() -> TableBuilder {
        TableBuilder {
            path: PathBuf::new(),
            max_pages: TABLE_MAX_PAGES,
        }
    }

    pub fn path<P: AsRef<Path>>(mut self, path: P) -> TableBuilder {
        self.path = path.as_ref().to_path_buf();
        self
    }

    pub fn max_pages(mut self, max_pages: usize) -> TableBuilder {
        self.max_pages = max_pages;
        self
    }

    pub fn open(&self) -> Result<Table> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig {
                reason: "path cannot be empty".to_string(),
            });
        }
        if self.max_pages == 0 || self.max_pages > TABLE_MAX_PAGES {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "max_pages must be between 1 and {TABLE_MAX_PAGES}, got {}",
                    self.max_pages
                ),
            });
        }

        let pager = Pager::open(&self.path, self.max_pages)?;
        let mut table = Table {
            pager,
            root_page_num: 0,
        };

        if table.pager.num_pages() == 0 {
            // new database, root starts as an empty leaf
            debug!(path = %self.path.display(), "initializing new database");
            table.init_leaf(table.root_page_num)?;
        } else {
            table.check_leaf(table.root_page_num)?;
        }

        debug!(
            path = %self.path.display(),
            pages = table.pager.num_pages(),
            capacity = table.capacity(),
            "opened table"
        );
        Ok(table)
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        TableBuilder::new()
    }
}

/// Single-table record store keyed by row id.
///
/// Rows live in leaf pages `0..n`. Page 0 is the root. Together the pages form one sorted
/// array of cells: every page but the last is full and all keys on a page are smaller
/// than the keys on the page after it. There are no internal nodes and no links between
/// pages, so capacity is exactly `max_pages * LEAF_NODE_MAX_CELLS`.
#[derive(Debug)]
pub struct Table {
    pager: Pager,
    root_page_num: u32,
}

impl Table {
    /// Opens the table at `path` with the default page limit.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        TableBuilder::new().path(path).open()
    }

    pub fn capacity(&self) -> usize {
        self.pager.max_pages() * LEAF_NODE_MAX_CELLS
    }

    pub fn num_rows(&mut self) -> Result<usize> {
        let mut total = 0;
        for page_num in self.root_page_num..self.pager.num_pages() {
            total += self.with_leaf(page_num, |node| node.cell_count())? as usize;
        }
        Ok(total)
    }

    /// Inserts a row in key order.
    ///
    /// Capacity is checked first, so once the table is full every insert fails with
    /// [`Error::TableFull`], duplicates included. A rejected row leaves the table untouched.
    pub fn insert(&mut self, row: &Row) -> Result<()> {
        let value = row.encode()?;
        let key = row.key();

        let capacity = self.capacity();
        if self.num_rows()? >= capacity {
            return Err(Error::TableFull { capacity });
        }

        let cursor = self.find(key)?;
        let exists = self.with_leaf(cursor.page_num, |node| {
            Ok(cursor.cell_num < node.cell_count()? && node.key(cursor.cell_num)? == key)
        })?;
        if exists {
            return Err(Error::DuplicateKey { key });
        }

        // A full page hands its largest cell on to the next one.
        let mut carry = (key, value);
        let mut page_num = cursor.page_num;
        loop {
            if page_num >= self.pager.num_pages() {
                self.init_leaf(page_num)?;
            }

            let page = self.pager.get_page(page_num)?;
            let mut page = page.borrow_mut();
            let mut node = LeafNode::new(&mut page.data[..])?;

            if !node.is_full()? {
                node.insert_cell(carry.0, &carry.1)?;
                debug!(key, page_num, "inserted row");
                return Ok(());
            }

            if node.max_key()? > Some(carry.0) {
                let last = node
                    .pop_last_cell()?
                    .ok_or_else(|| Error::corrupt("full leaf node without cells"))?;
                node.insert_cell(carry.0, &carry.1)?;
                carry = last;
            }
            page_num += 1;
        }
    }

    /// Return the position of the given key.
    /// If the key is not present, return the position where it should be inserted.
    pub fn find(&mut self, key: u32) -> Result<Cursor> {
        let last_page = self.pager.num_pages().saturating_sub(1);
        for page_num in self.root_page_num..=last_page {
            let slot = self.with_leaf(page_num, |node| {
                Ok(match node.max_key()? {
                    Some(max) if max >= key => Some(node.find_slot(key)?),
                    _ if page_num == last_page => Some(node.find_slot(key)?),
                    _ => None,
                })
            })?;
            if let Some(cell_num) = slot {
                return Ok(Cursor::new(page_num, cell_num));
            }
        }
        Err(Error::corrupt("table has no root page"))
    }

    /// Searches for particular saved row.
    pub fn search(&mut self, key: u32) -> Result<Option<Row>> {
        let cursor = self.find(key)?;
        let found = self.with_leaf(cursor.page_num, |node| {
            Ok(cursor.cell_num < node.cell_count()? && node.key(cursor.cell_num)? == key)
        })?;
        if !found {
            return Ok(None);
        }
        Ok(Some(cursor.value(&mut self.pager)?))
    }

    /// Every row in ascending key order. Each call starts over from the first row.
    pub fn scan(&mut self) -> Rows<'_> {
        Rows::new(&mut self.pager, self.root_page_num)
    }

    pub fn dump_tree(&mut self) -> Result<TreeDump> {
        let mut nodes = vec![];
        for page_num in self.root_page_num..self.pager.num_pages() {
            let node = self.with_leaf(page_num, |node| {
                Ok(NodeDump {
                    page_num,
                    node_type: node.node_type()?,
                    keys: node.keys()?,
                })
            })?;
            nodes.push(node);
        }
        Ok(TreeDump { nodes })
    }

    pub fn constants() -> Constants {
        Constants {
            row_size: ROW_SIZE,
            common_node_header_size: COMMON_NODE_HEADER_SIZE,
            leaf_node_header_size: LEAF_NODE_HEADER_SIZE,
            leaf_node_cell_size: LEAF_NODE_CELL_SIZE,
            leaf_node_space_for_cells: LEAF_NODE_SPACE_FOR_CELLS,
            leaf_node_max_cells: LEAF_NODE_MAX_CELLS,
        }
    }

    /// Consumes Table and saves all content to file.
    pub fn close(self) -> Result<()> {
        debug!(pages = self.pager.num_pages(), "closing table");
        self.pager.close()
    }

    fn init_leaf(&mut self, page_num: u32) -> Result<()> {
        let page = self.pager.get_page(page_num)?;
        let mut page = page.borrow_mut();
        let mut node = LeafNode::new(&mut page.data[..])?;
        node.initialize(page_num == self.root_page_num);
        Ok(())
    }

    fn check_leaf(&mut self, page_num: u32) -> Result<()> {
        self.with_leaf(page_num, |_| Ok(()))
    }

    /// Runs `f` on a read-only view of a leaf page.
    fn with_leaf<T, F>(&mut self, page_num: u32, f: F) -> Result<T>
    where
        F: FnOnce(&LeafNode<&[u8]>) -> Result<T>,
    {
        let page = self.pager.get_page(page_num)?;
        let page = page.borrow();
        let node = LeafNode::new(&page.data[..])?;
        match node.node_type()? {
            NodeType::Leaf => f(&node),
            NodeType::Internal => Err(Error::corrupt(format!(
                "page {page_num} holds an internal node, only leaf nodes are supported"
            ))),
        }
    }
}

/// One node of [`TreeDump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDump {
    pub page_num: u32,
    pub node_type: NodeType,
    /// Keys in cell order.
    pub keys: Vec<u32>,
}

/// Structure of the table's pages, used by the `.btree` meta command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDump {
    pub nodes: Vec<NodeDump>,
}

impl fmt::Display for TreeDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            let kind = match node.node_type {
                NodeType::Leaf => "leaf",
                NodeType::Internal => "internal",
            };
            writeln!(f, "{kind} (size {})", node.keys.len())?;
            for (i, key) in node.keys.iter().enumerate() {
                writeln!(f, "\t- {i} : {key}")?;
            }
        }
        Ok(())
    }
}

/// Fixed structural sizes of the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constants {
    pub row_size: usize,
    pub common_node_header_size: usize,
    pub leaf_node_header_size: usize,
    pub leaf_node_cell_size: usize,
    pub leaf_node_space_for_cells: usize,
    pub leaf_node_max_cells: usize,
}

impl fmt::Display for Constants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ROW_SIZE: {}", self.row_size)?;
        writeln!(f, "COMMON_NODE_HEADER_SIZE: {}", self.common_node_header_size)?;
        writeln!(f, "LEAF_NODE_HEADER_SIZE: {}", self.leaf_node_header_size)?;
        writeln!(f, "LEAF_NODE_CELL_SIZE: {}", self.leaf_node_cell_size)?;
        writeln!(f, "LEAF_NODE_SPACE_FOR_CELLS: {}", self.leaf_node_space_for_cells)?;
        writeln!(f, "LEAF_NODE_MAX_CELLS: {}", self.leaf_node_max_cells)
    }
}
