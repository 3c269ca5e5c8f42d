//! Group Reservation Table.
//!
//! One sector of next-cluster links: `grt[n]` is the cluster following `n`.
//! Files and the free list are chains through this table, terminated by a
//! link back to cluster 0. Entry 0 heads the free list.

use crate::error::{DiskError, DiskResult};
use crate::sector::{Sector, SECTOR_SIZE};

#[derive(Clone, PartialEq, Eq)]
pub struct Grt {
    links: Sector,
}

impl Grt {
    pub fn new(links: Sector) -> Self {
        Self { links }
    }

    pub fn next(&self, cluster: u8) -> u8 {
        self.links[cluster as usize]
    }

    /// Clusters of a chain in order, starting at `first` and ending before
    /// the link back to 0. The start is always included.
    pub fn chain(&self, first: u8) -> DiskResult<Vec<u8>> {
        self.walk(first, None)
    }

    /// Follow links from `first` until the link back to 0, or until `stop`
    /// has been taken.
    fn walk(&self, first: u8, stop: Option<u8>) -> DiskResult<Vec<u8>> {
        let mut visited = [false; SECTOR_SIZE];
        let mut clusters = Vec::new();
        let mut current = first;

        loop {
            visited[current as usize] = true;
            clusters.push(current);
            if stop == Some(current) {
                return Ok(clusters);
            }

            let next = self.next(current);
            if next == 0 {
                return Ok(clusters);
            }
            if visited[next as usize] {
                return Err(DiskError::corrupt_chain(
                    "GRT",
                    format!(
                        "cluster {} links back to {} (chain from {})",
                        current, next, first
                    ),
                ));
            }
            current = next;
        }
    }

    /// Sector numbers of a file's clusters.
    ///
    /// The walk ends at `last_cluster`, which contributes `last_count`
    /// sectors; every cluster before it contributes `sectors_per_group`.
    /// A zero-length file (`first == last_cluster`, `last_count == 0`) takes
    /// one step and covers nothing, whatever cluster `first` links to.
    pub fn sectors(
        &self,
        first: u8,
        last_cluster: u8,
        last_count: u8,
        sectors_per_group: u8,
    ) -> DiskResult<Vec<u32>> {
        let spg = sectors_per_group as u32;
        let mut sectors = Vec::new();

        for cluster in self.walk(first, Some(last_cluster))? {
            let count = if cluster == last_cluster {
                last_count as u32
            } else {
                spg
            };
            let base = cluster as u32 * spg;
            sectors.extend(base..base + count);
        }

        Ok(sectors)
    }

    /// Sectors on the free list, counted from the head at cluster 0.
    pub fn free_sector_count(&self, sectors_per_group: u8) -> DiskResult<usize> {
        Ok(self.chain(0)?.len() * sectors_per_group as usize)
    }
}

impl std::fmt::Debug for Grt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grt").field("head", &self.links[0]).finish()
    }
}
