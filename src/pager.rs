use std::{
    cell::RefCell,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
    rc::Rc,
};

use tracing::{debug, warn};

use crate::{
    constants::PAGE_SIZE,
    error::{Error, Result},
};

#[derive(Debug, Clone)]
pub struct Page {
    pub data: [u8; PAGE_SIZE],
}

impl Page {
    pub fn new() -> Self {
        Self {
            data: [0; PAGE_SIZE],
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps the database file to fixed-size pages and caches them in memory.
///
/// The pager is the only component that touches the file. Pages handed out by
/// [`Pager::get_page`] stay cached until [`Pager::close`], which writes every one of
/// them back as a whole-page overwrite.
#[derive(Debug)]
pub struct Pager {
    f: File,
    /// Pages currently present in the file.
    file_pages: u32,
    /// Pages in the file plus pages handed out since open.
    num_pages: u32,
    max_pages: usize,
    pages: Vec<Option<Rc<RefCell<Page>>>>,
}

impl Pager {
    /// Opens (creating if absent) the file at `p`.
    pub fn open<P: AsRef<Path>>(p: P, max_pages: usize) -> Result<Self> {
        let path = p.as_ref();
        let f = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_len = f.metadata()?.len();
        if file_len % PAGE_SIZE as u64 != 0 {
            return Err(Error::corrupt(format!(
                "file length {file_len} is not a whole number of pages"
            )));
        }

        let file_pages = file_len / PAGE_SIZE as u64;
        if file_pages > max_pages as u64 {
            return Err(Error::corrupt(format!(
                "file holds {file_pages} pages, more than the maximum of {max_pages}"
            )));
        }
        let file_pages = file_pages as u32;

        debug!(path = %path.display(), file_pages, max_pages, "opened pager");

        Ok(Self {
            f,
            file_pages,
            num_pages: file_pages,
            max_pages,
            pages: vec![None; max_pages],
        })
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    pub fn get_page(&mut self, page_num: u32) -> Result<Rc<RefCell<Page>>> {
        let slot = self
            .pages
            .get_mut(page_num as usize)
            .ok_or(Error::PageOutOfRange {
                page_num,
                max_pages: self.max_pages,
            })?;

        if let Some(page) = slot {
            return Ok(page.clone());
        }

        let mut page = Page::new();
        if page_num < self.file_pages {
            debug!(page_num, "reading page from file");
            self.f
                .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
            self.f.read_exact(&mut page.data)?;
        } else {
            debug!(page_num, "allocating new page");
        }

        let p = Rc::new(RefCell::new(page));
        *slot = Some(p.clone());

        if page_num >= self.num_pages {
            self.num_pages = page_num + 1
        }

        Ok(p)
    }

    /// Writes the whole cached page back to its place in the file.
    pub fn flush(&mut self, page_num: u32) -> Result<()> {
        let page = self
            .pages
            .get(page_num as usize)
            .and_then(|p| p.as_ref())
            .ok_or(Error::FlushUncached { page_num })?;

        self.f
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.f.write_all(&page.borrow().data)?;

        if page_num >= self.file_pages {
            self.file_pages = page_num + 1;
        }
        debug!(page_num, "flushed page");
        Ok(())
    }

    fn flush_all(&mut self) -> Result<()> {
        for page_num in 0..self.num_pages {
            if self.pages[page_num as usize].is_some() {
                self.flush(page_num)?;
            }
        }
        self.f.sync_all()?;
        Ok(())
    }

    /// Flushes every cached page, then releases the cache and the file handle.
    pub fn close(mut self) -> Result<()> {
        let result = self.flush_all();
        // Nothing left for drop to write, whether or not flushing worked.
        self.pages.iter_mut().for_each(|p| *p = None);
        result
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        if self.pages.iter().all(Option::is_none) {
            return;
        }
        warn!("pager dropped without close, flushing cached pages");
        if let Err(err) = self.flush_all() {
            warn!(%err, "could not flush pages on drop");
        }
    }
}
