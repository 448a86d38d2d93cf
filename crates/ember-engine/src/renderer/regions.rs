use crate::coords::VramRect;

#[inline]
fn join(a: Option<VramRect>, b: VramRect) -> Option<VramRect> {
    if b.is_empty() {
        return a;
    }
    Some(a.map_or(b, |a| a.union(b)))
}

#[inline]
fn overlaps(a: Option<VramRect>, b: VramRect) -> bool {
    a.is_some_and(|a| a.intersects(b))
}

/// Bounding boxes (native coordinates) of VRAM traffic the native store
/// and the render target do not agree on yet.
///
/// - pending: staged in a batch, not drawn
/// - reads: native texels a staged textured primitive samples
/// - unsynced: drawn into the render target, not downsampled
///
/// The native store must not change under a pending read until that
/// batch is drawn.
#[derive(Debug, Clone, Default)]
pub(crate) struct DirtyRegions {
    pending_opaque: Option<VramRect>,
    pending_semi: Option<VramRect>,
    reads_opaque: Option<VramRect>,
    reads_semi: Option<VramRect>,
    unsynced: Option<VramRect>,
}

impl DirtyRegions {
    pub fn stage(&mut self, semi_transparent: bool, rect: VramRect) {
        if semi_transparent {
            self.pending_semi = join(self.pending_semi, rect);
        } else {
            self.pending_opaque = join(self.pending_opaque, rect);
        }
    }

    /// Records texels a staged primitive samples.
    pub fn stage_reads(&mut self, semi_transparent: bool, footprint: &[VramRect]) {
        let reads = if semi_transparent {
            &mut self.reads_semi
        } else {
            &mut self.reads_opaque
        };
        for rect in footprint {
            *reads = join(*reads, *rect);
        }
    }

    /// The opaque batch was drawn (or dropped).
    pub fn opaque_flushed(&mut self) {
        self.reads_opaque = None;
        if let Some(r) = self.pending_opaque.take() {
            self.unsynced = join(self.unsynced, r);
        }
    }

    /// The semi-transparent batch was drawn (or dropped).
    pub fn semi_flushed(&mut self) {
        self.reads_semi = None;
        if let Some(r) = self.pending_semi.take() {
            self.unsynced = join(self.unsynced, r);
        }
    }

    #[inline]
    pub fn pending_overlaps(&self, rect: VramRect) -> bool {
        overlaps(self.pending_opaque, rect) || overlaps(self.pending_semi, rect)
    }

    /// Whether rewriting `rect` of the native store would change what a
    /// staged primitive samples.
    #[inline]
    pub fn reads_overlap(&self, rect: VramRect) -> bool {
        overlaps(self.reads_opaque, rect) || overlaps(self.reads_semi, rect)
    }

    #[inline]
    pub fn unsynced_overlaps(&self, rect: VramRect) -> bool {
        overlaps(self.unsynced, rect)
    }

    /// Whether a sync of the current unsynced region would land under a
    /// staged read.
    #[inline]
    pub fn sync_hits_reads(&self) -> bool {
        self.unsynced.is_some_and(|r| self.reads_overlap(r))
    }

    /// Region to downsample; the caller syncs it.
    #[inline]
    pub fn take_unsynced(&mut self) -> Option<VramRect> {
        self.unsynced.take()
    }

    /// Restores a region whose sync failed.
    #[inline]
    pub fn mark_unsynced(&mut self, rect: VramRect) {
        self.unsynced = join(self.unsynced, rect);
    }
}
