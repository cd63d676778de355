use crate::{
    constants::{
        IS_ROOT_OFFSET, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_KEY_OFFSET,
        LEAF_NODE_KEY_SIZE, LEAF_NODE_MAX_CELLS, LEAF_NODE_NUM_CELLS_OFFSET,
        LEAF_NODE_NUM_CELLS_SIZE, LEAF_NODE_VALUE_OFFSET, LEAF_NODE_VALUE_SIZE, NODE_TYPE_OFFSET,
        PAGE_SIZE, PARENT_POINTER_OFFSET, PARENT_POINTER_SIZE, ROW_SIZE,
    },
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Internal nodes would hold child pointers. Nothing writes them yet, the tag is
    /// reserved so the cell format does not change once splitting exists.
    Internal,

    Leaf,
}

impl TryFrom<u8> for NodeType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x00 => Self::Internal,
            0x01 => Self::Leaf,
            _ => return Err(Error::corrupt(format!("invalid node type: {value}"))),
        })
    }
}

impl From<NodeType> for u8 {
    fn from(val: NodeType) -> Self {
        match val {
            NodeType::Internal => 0x00,
            NodeType::Leaf => 0x01,
        }
    }
}

/// A page buffer read as a leaf node.
///
/// ```text
/// | type (1) | is_root (1) | parent (4) | num_cells (4) | key (4) + row (293) | ... |
/// ```
///
/// Cells are packed from the start of the body in ascending key order. The view never
/// owns the buffer; read accessors need `AsRef<[u8]>`, mutation needs `AsMut<[u8]>` too.
pub struct LeafNode<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> LeafNode<B> {
    pub fn new(buf: B) -> Result<Self> {
        let len = buf.as_ref().len();
        if len != PAGE_SIZE {
            return Err(Error::corrupt(format!(
                "node buffer is {len} bytes, expected {PAGE_SIZE}"
            )));
        }
        Ok(Self { buf })
    }

    fn field(&self, offset: usize, size: usize) -> &[u8] {
        &self.buf.as_ref()[offset..offset + size]
    }

    fn u32_at(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.field(offset, 4));
        u32::from_le_bytes(bytes)
    }

    pub fn node_type(&self) -> Result<NodeType> {
        NodeType::try_from(self.buf.as_ref()[NODE_TYPE_OFFSET])
    }

    pub fn is_root(&self) -> bool {
        self.buf.as_ref()[IS_ROOT_OFFSET] == 1
    }

    pub fn parent(&self) -> u32 {
        self.u32_at(PARENT_POINTER_OFFSET)
    }

    /// Cell count from the header. Counts no page could hold are reported as corruption.
    pub fn cell_count(&self) -> Result<u32> {
        let num_cells = self.u32_at(LEAF_NODE_NUM_CELLS_OFFSET);
        if num_cells as usize > LEAF_NODE_MAX_CELLS {
            return Err(Error::corrupt(format!(
                "leaf node claims {num_cells} cells, max is {LEAF_NODE_MAX_CELLS}"
            )));
        }
        Ok(num_cells)
    }

    pub fn is_full(&self) -> Result<bool> {
        Ok(self.cell_count()? as usize >= LEAF_NODE_MAX_CELLS)
    }

    fn cell_offset(cell_num: usize) -> usize {
        LEAF_NODE_HEADER_SIZE + cell_num * LEAF_NODE_CELL_SIZE
    }

    fn key_unchecked(&self, cell_num: usize) -> u32 {
        self.u32_at(Self::cell_offset(cell_num) + LEAF_NODE_KEY_OFFSET)
    }

    pub fn key(&self, cell_num: u32) -> Result<u32> {
        self.check_cell(cell_num)?;
        Ok(self.key_unchecked(cell_num as usize))
    }

    /// Largest key in the node, `None` when it is empty.
    pub fn max_key(&self) -> Result<Option<u32>> {
        Ok(match self.cell_count()? {
            0 => None,
            n => Some(self.key_unchecked(n as usize - 1)),
        })
    }

    pub fn read_cell(&self, cell_num: u32) -> Result<(u32, &[u8; ROW_SIZE])> {
        self.check_cell(cell_num)?;
        let offset = Self::cell_offset(cell_num as usize);
        let value: &[u8; ROW_SIZE] = self
            .field(offset + LEAF_NODE_VALUE_OFFSET, LEAF_NODE_VALUE_SIZE)
            .try_into()
            .map_err(|_| Error::corrupt("leaf cell value has wrong size"))?;
        Ok((self.key_unchecked(cell_num as usize), value))
    }

    /// Binary search over the cells: the index holding `key`, or the index where it
    /// would have to be inserted to keep the cells sorted.
    pub fn find_slot(&self, key: u32) -> Result<u32> {
        let mut min = 0usize;
        let mut one_past_max = self.cell_count()? as usize;

        while one_past_max != min {
            let index = (min + one_past_max) / 2;
            let key_at_index = self.key_unchecked(index);
            if key == key_at_index {
                return Ok(index as u32);
            }
            if key < key_at_index {
                one_past_max = index;
            } else {
                min = index + 1;
            }
        }

        Ok(min as u32)
    }

    /// Keys in cell order.
    pub fn keys(&self) -> Result<Vec<u32>> {
        Ok((0..self.cell_count()? as usize)
            .map(|i| self.key_unchecked(i))
            .collect())
    }

    fn check_cell(&self, cell_num: u32) -> Result<()> {
        let num_cells = self.cell_count()?;
        if cell_num >= num_cells {
            return Err(Error::corrupt(format!(
                "cell {cell_num} out of bounds, node holds {num_cells} cells"
            )));
        }
        Ok(())
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> LeafNode<B> {
    fn field_mut(&mut self, offset: usize, size: usize) -> &mut [u8] {
        &mut self.buf.as_mut()[offset..offset + size]
    }

    /// Resets the page to an empty leaf.
    pub fn initialize(&mut self, is_root: bool) {
        self.buf.as_mut().fill(0);
        self.buf.as_mut()[NODE_TYPE_OFFSET] = NodeType::Leaf.into();
        self.set_root(is_root);
        self.set_parent(0);
        self.set_cell_count(0);
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.buf.as_mut()[IS_ROOT_OFFSET] = is_root.into();
    }

    pub fn set_parent(&mut self, parent: u32) {
        self.field_mut(PARENT_POINTER_OFFSET, PARENT_POINTER_SIZE)
            .copy_from_slice(&parent.to_le_bytes());
    }

    fn set_cell_count(&mut self, num_cells: u32) {
        self.field_mut(LEAF_NODE_NUM_CELLS_OFFSET, LEAF_NODE_NUM_CELLS_SIZE)
            .copy_from_slice(&num_cells.to_le_bytes());
    }

    fn write_cell(&mut self, cell_num: usize, key: u32, value: &[u8; ROW_SIZE]) {
        let offset = Self::cell_offset(cell_num);
        self.field_mut(offset + LEAF_NODE_KEY_OFFSET, LEAF_NODE_KEY_SIZE)
            .copy_from_slice(&key.to_le_bytes());
        self.field_mut(offset + LEAF_NODE_VALUE_OFFSET, LEAF_NODE_VALUE_SIZE)
            .copy_from_slice(value);
    }

    /// Inserts a cell keeping the keys sorted. Fails without touching the page when the
    /// key is already present or the node has no room left.
    pub fn insert_cell(&mut self, key: u32, value: &[u8; ROW_SIZE]) -> Result<u32> {
        let num_cells = self.cell_count()? as usize;
        let slot = self.find_slot(key)? as usize;

        if slot < num_cells && self.key_unchecked(slot) == key {
            return Err(Error::DuplicateKey { key });
        }
        if num_cells >= LEAF_NODE_MAX_CELLS {
            return Err(Error::NodeFull);
        }

        if slot < num_cells {
            // make room for the new cell
            let start = Self::cell_offset(slot);
            let end = Self::cell_offset(num_cells);
            self.buf
                .as_mut()
                .copy_within(start..end, start + LEAF_NODE_CELL_SIZE);
        }
        self.write_cell(slot, key, value);
        self.set_cell_count(num_cells as u32 + 1);

        Ok(slot as u32)
    }

    /// Removes and returns the cell holding the largest key.
    pub fn pop_last_cell(&mut self) -> Result<Option<(u32, [u8; ROW_SIZE])>> {
        let num_cells = self.cell_count()?;
        if num_cells == 0 {
            return Ok(None);
        }

        let last = num_cells - 1;
        let (key, value) = self.read_cell(last)?;
        let value = *value;

        let offset = Self::cell_offset(last as usize);
        self.field_mut(offset, LEAF_NODE_CELL_SIZE).fill(0);
        self.set_cell_count(last);

        Ok(Some((key, value)))
    }
}
