//! Page boundary planning.
//!
//! The planner owns the book-wide running counters and decides, for each text
//! run, whether one or more page boundaries fall inside it and at which word
//! offset. It never touches markup; the inserter consumes its events.

/// Book-wide running state threaded through a pagination run.
///
/// `current_page` only ever increases. `words_since_boundary` is decremented
/// by the page size at each boundary rather than zeroed, so the remainder
/// carries forward and cumulative drift stays bounded over a full book.
#[derive(Debug, Clone, Default)]
pub struct BookCounters {
    pub total_words: u64,
    pub words_since_boundary: u32,
    pub current_page: u32,
    pub section_page: u32,
}

impl BookCounters {
    pub fn new() -> Self {
        Self {
            total_words: 0,
            words_since_boundary: 0,
            current_page: 1,
            section_page: 1,
        }
    }
}

/// One page boundary inside (or at the start of) a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBoundaryEvent {
    /// Page number carried by the anchor at this boundary.
    pub page: u32,
    /// Page number within the current section.
    pub section_page: u32,
    /// Word offset within the run after which the marker goes; 0 means the
    /// marker is placed before the run.
    pub word_offset: usize,
}

/// Decides page boundaries as word runs stream past.
#[derive(Debug)]
pub struct BoundaryPlanner {
    words_per_page: u32,
    start_window: u32,
    pub counters: BookCounters,
}

impl BoundaryPlanner {
    pub fn new(words_per_page: u32, start_window: u32) -> Self {
        debug_assert!(words_per_page > 0);
        Self {
            words_per_page,
            start_window,
            counters: BookCounters::new(),
        }
    }

    pub fn words_per_page(&self) -> u32 {
        self.words_per_page
    }

    /// Reset the per-section page counter at a content-file boundary.
    pub fn start_section(&mut self) {
        self.counters.section_page = 1;
    }

    /// Account for a run of `run_words` words and emit one event per page
    /// boundary crossed inside it.
    ///
    /// A run longer than a page emits several events; the loop runs until the
    /// remainder drops below the threshold. A boundary landing within
    /// `start_window` words of the run start is clamped to offset 0 so the
    /// marker sits before the run instead of splitting it just after a
    /// structural element.
    pub fn advance(&mut self, run_words: usize) -> Vec<PageBoundaryEvent> {
        self.counters.total_words += run_words as u64;

        let need = self.words_per_page - self.counters.words_since_boundary;
        self.counters.words_since_boundary += run_words as u32;

        let mut events = Vec::new();
        let mut offset = need as usize;
        while self.counters.words_since_boundary >= self.words_per_page {
            let word_offset = if events.is_empty() && need < self.start_window {
                0
            } else {
                offset
            };
            events.push(PageBoundaryEvent {
                page: self.counters.current_page,
                section_page: self.counters.section_page,
                word_offset,
            });
            self.counters.current_page += 1;
            self.counters.section_page += 1;
            self.counters.words_since_boundary -= self.words_per_page;
            offset += self.words_per_page as usize;
        }
        events
    }
}
