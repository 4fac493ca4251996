//! Tab registry
//!
//! Owns the ordered collection of live tabs and all the identity state that
//! goes with it: the monotonic region-id counter, ordinal renumbering on
//! removal, duplicate-open prevention for resource tabs, and the soft
//! capacity cap. Mutated only from the render thread.
//!
//! Two parallel sequences are maintained, mirroring the navigation bar's
//! highlight regions: `tabs` (ordinal order) and `region_ids`. A region id
//! is assigned once at creation and never reused or renumbered, so a
//! pending navigation keyed by region id survives unrelated removals.

use ratatui::text::Text;
use tracing::debug;

use crate::session::Session;

/// Hard addressing limit: single-digit direct navigation (command-mode
/// digits 1-9) must be able to reach every tab.
pub const MAX_TABS: usize = 9;

/// What a tab displays: a live process session or a static read-only view
pub enum TabContent {
    Interactive(Session),
    Static(StaticView),
}

/// Read-only renderable content (home page, documentation viewers)
pub struct StaticView {
    pub body: Text<'static>,
}

impl StaticView {
    #[must_use]
    pub fn new(body: impl Into<Text<'static>>) -> Self {
        Self { body: body.into() }
    }
}

/// A named, orderable UI slot in the multiplexer
pub struct Tab {
    /// Position among live tabs; renumbered on every removal
    ordinal: usize,
    /// Stable identity; monotonic, never reused
    region_id: u64,
    title: String,
    /// Resource tabs (cluster logins, document viewers) dedup by title
    resource: bool,
    pub content: TabContent,
}

impl Tab {
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    #[must_use]
    pub fn region_id(&self) -> u64 {
        self.region_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Result of a create request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new tab was inserted and made active
    Created(u64),
    /// A live resource tab with this title already exists; it was made
    /// active instead of spawning a duplicate
    FocusExisting(u64),
    /// Capacity reached; deliberate soft cap, not an error
    AtCapacity,
}

/// Result of a remove request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// The sole remaining tab was removed; the application should quit
    Quit,
    /// The region id was already gone (e.g. a process-exit event racing a
    /// manual close); treated as a no-op
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDirection {
    Next,
    Previous,
}

/// Ordered collection of live tabs plus the active-tab cursor
pub struct TabRegistry {
    tabs: Vec<Tab>,
    region_ids: Vec<u64>,
    next_region_id: u64,
    active: usize,
}

impl TabRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tabs: Vec::with_capacity(MAX_TABS),
            region_ids: Vec::with_capacity(MAX_TABS),
            next_region_id: 0,
            active: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    #[must_use]
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    #[must_use]
    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs.get(self.active)
    }

    pub fn active_tab_mut(&mut self) -> Option<&mut Tab> {
        self.tabs.get_mut(self.active)
    }

    #[must_use]
    pub fn active_region_id(&self) -> Option<u64> {
        self.region_ids.get(self.active).copied()
    }

    pub fn tab_by_region_mut(&mut self, region_id: u64) -> Option<&mut Tab> {
        let index = self.find_by_region(region_id)?;
        self.tabs.get_mut(index)
    }

    /// Linear lookup by region id. Returns `None` for stale ids; callers
    /// must tolerate a miss.
    #[must_use]
    pub fn find_by_region(&self, region_id: u64) -> Option<usize> {
        self.region_ids.iter().position(|&id| id == region_id)
    }

    /// Lookup a live resource tab by title (duplicate-open prevention).
    /// Plain tabs never participate: a shell tab whose title happens to
    /// collide with a resource name must not absorb the resource request.
    fn find_by_title(&self, title: &str) -> Option<u64> {
        self.tabs
            .iter()
            .find(|tab| tab.resource && tab.title == title)
            .map(|tab| tab.region_id)
    }

    /// Create a tab and make it active.
    ///
    /// For resource tabs (cluster logins, document viewers) a live tab with
    /// the same title is refocused instead of duplicated. Once the capacity
    /// cap is reached the request is dropped without error - the operator
    /// is expected to close tabs before opening more.
    ///
    /// `make` builds the content for the allocated region id; it is only
    /// invoked when a tab is actually inserted, so failed or deduplicated
    /// requests never consume an id.
    pub fn create(
        &mut self,
        title: impl Into<String>,
        is_resource_tab: bool,
        make: impl FnOnce(u64) -> TabContent,
    ) -> CreateOutcome {
        let title = title.into();

        if is_resource_tab {
            if let Some(existing) = self.find_by_title(&title) {
                debug!("Refocusing existing tab for {}", title);
                if let Some(index) = self.find_by_region(existing) {
                    self.active = index;
                }
                return CreateOutcome::FocusExisting(existing);
            }
        }

        if self.tabs.len() >= MAX_TABS {
            debug!("Tab capacity reached, ignoring create for {}", title);
            return CreateOutcome::AtCapacity;
        }

        let region_id = self.next_region_id;
        self.next_region_id += 1;

        let ordinal = self.tabs.len();
        self.tabs.push(Tab {
            ordinal,
            region_id,
            title,
            resource: is_resource_tab,
            content: make(region_id),
        });
        self.region_ids.push(region_id);
        self.active = ordinal;

        CreateOutcome::Created(region_id)
    }

    /// Remove a tab by region id.
    ///
    /// Removing the last remaining tab is defined as "quit" - an empty
    /// registry is not a representable state. Otherwise the tab is spliced
    /// out of both parallel sequences, remaining ordinals are renumbered
    /// (region ids never are), the session is torn down, and the active
    /// tab becomes the one preceding the removed tab (cyclic).
    pub fn remove(&mut self, region_id: u64) -> RemoveOutcome {
        let Some(index) = self.find_by_region(region_id) else {
            debug!("Ignoring removal of stale region {}", region_id);
            return RemoveOutcome::Stale;
        };

        if self.tabs.len() == 1 {
            return RemoveOutcome::Quit;
        }

        let mut tab = self.tabs.remove(index);
        self.region_ids.remove(index);
        if let TabContent::Interactive(ref mut session) = tab.content {
            session.close();
        }

        for (ordinal, tab) in self.tabs.iter_mut().enumerate() {
            tab.ordinal = ordinal;
        }

        self.active = (index + self.tabs.len() - 1) % self.tabs.len();

        debug!(
            "Removed region {}, {} tabs remain, active ordinal {}",
            region_id,
            self.tabs.len(),
            self.active
        );

        RemoveOutcome::Removed
    }

    /// Cyclic next/previous navigation. Returns the new active region id.
    pub fn navigate(&mut self, direction: NavDirection) -> Option<u64> {
        if self.tabs.is_empty() {
            return None;
        }

        self.active = match direction {
            NavDirection::Next => (self.active + 1) % self.tabs.len(),
            NavDirection::Previous => (self.active + self.tabs.len() - 1) % self.tabs.len(),
        };

        self.active_region_id()
    }

    /// Jump to an absolute 1-based ordinal. Out-of-range requests are
    /// ignored: no error, no state change.
    pub fn navigate_to_ordinal(&mut self, one_based: usize) -> Option<u64> {
        if one_based == 0 || one_based > self.tabs.len() {
            return None;
        }

        self.active = one_based - 1;
        self.active_region_id()
    }
}

impl Default for TabRegistry {
    fn default() -> Self {
        Self::new()
    }
}
