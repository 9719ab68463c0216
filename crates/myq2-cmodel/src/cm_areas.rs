// cm_areas.rs — area portal connectivity
//
// Areas are rooms joined by portals (usually doors). Each flood pass gives
// every group of areas reachable through open portals a shared flood number.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use log::debug;

use crate::cm_tree::{CArea, CAreaPortal};

/// Open/closed state per portal plus the result of the last flood.
#[derive(Debug, Clone, Default)]
pub struct AreaGraph {
    portal_open: Vec<bool>,
    flood_num: Vec<i32>,
    /// An area's flood number counts only if this equals `generation`.
    flood_valid: Vec<u32>,
    generation: u32,
}

impl AreaGraph {
    /// All portals start closed. Call `flood` before querying.
    pub fn new(num_areas: usize, num_portals: usize) -> Self {
        Self {
            portal_open: vec![false; num_portals],
            flood_num: vec![0; num_areas],
            flood_valid: vec![0; num_areas],
            generation: 0,
        }
    }

    pub fn num_areas(&self) -> usize {
        self.flood_num.len()
    }

    pub fn num_portals(&self) -> usize {
        self.portal_open.len()
    }

    pub fn is_open(&self, portal: usize) -> Option<bool> {
        self.portal_open.get(portal).copied()
    }

    /// Flood number from the current pass; 0 for areas the pass never reached.
    pub fn flood_num(&self, area: usize) -> Option<i32> {
        let valid = *self.flood_valid.get(area)?;
        Some(if valid == self.generation {
            self.flood_num[area]
        } else {
            0
        })
    }

    /// Recompute flood numbers, breadth first from each unreached area
    /// starting at area 1. Area 0 is only numbered when a portal reaches it.
    pub fn flood(&mut self, areas: &[CArea], portals: &[CAreaPortal]) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.flood_valid.fill(0);
            self.generation = 1;
        }

        let count = areas.len().min(self.flood_num.len());
        let mut floodnum = 0;
        let mut queue = VecDeque::new();

        for start in 1..count {
            if self.flood_valid[start] == self.generation {
                continue;
            }
            floodnum += 1;
            self.mark(start, floodnum);
            queue.push_back(start);

            while let Some(area) = queue.pop_front() {
                let a = &areas[area];
                let span = a.first_area_portal..a.first_area_portal + a.num_area_portals;
                for portal in &portals[span] {
                    if !self.is_open(portal.portal_num).unwrap_or(false) {
                        continue;
                    }
                    let other = portal.other_area;
                    if other < count && self.flood_valid[other] != self.generation {
                        self.mark(other, floodnum);
                        queue.push_back(other);
                    }
                }
            }
        }

        debug!("area flood: {} groups over {} areas", floodnum, count);
    }

    fn mark(&mut self, area: usize, floodnum: i32) {
        self.flood_num[area] = floodnum;
        self.flood_valid[area] = self.generation;
    }

    /// Set one portal and reflood. False if `portal` is out of range.
    pub fn set_portal_state(
        &mut self,
        portal: usize,
        open: bool,
        areas: &[CArea],
        portals: &[CAreaPortal],
    ) -> bool {
        match self.portal_open.get_mut(portal) {
            Some(slot) => *slot = open,
            None => return false,
        }
        self.flood(areas, portals);
        true
    }

    /// Close every portal and reflood.
    pub fn close_all(&mut self, areas: &[CArea], portals: &[CAreaPortal]) {
        self.portal_open.fill(false);
        self.flood(areas, portals);
    }

    /// `None` when either area is out of range.
    pub fn areas_connected(&self, area1: usize, area2: usize, no_areas: bool) -> Option<bool> {
        if no_areas {
            return Some(true);
        }
        Some(self.flood_num(area1)? == self.flood_num(area2)?)
    }

    /// One bit per area connected to `area`; area 0 means every area.
    /// Fills as much of the row as fits in `buffer` and returns the bytes
    /// written.
    pub fn write_area_bits(&self, buffer: &mut [u8], area: usize, no_areas: bool) -> usize {
        let bytes = (self.num_areas() + 7) >> 3;
        let fill = bytes.min(buffer.len());

        if no_areas {
            buffer[..fill].fill(0xff);
            return fill;
        }

        buffer[..fill].fill(0);
        let floodnum = self.flood_num(area);
        for i in 0..self.num_areas() {
            if area == 0 || (floodnum.is_some() && self.flood_num(i) == floodnum) {
                if let Some(b) = buffer.get_mut(i >> 3) {
                    *b |= 1 << (i & 7);
                }
            }
        }

        fill
    }

    /// One byte per portal slot, 1 open and 0 closed, in portal order.
    pub fn write_portal_state(&self, writer: &mut dyn Write) -> io::Result<()> {
        let bytes: Vec<u8> = self.portal_open.iter().map(|&open| open as u8).collect();
        writer.write_all(&bytes)
    }

    /// Inverse of `write_portal_state`; refloods on success. On error the
    /// current state is left untouched.
    pub fn read_portal_state(
        &mut self,
        reader: &mut dyn Read,
        areas: &[CArea],
        portals: &[CAreaPortal],
    ) -> io::Result<()> {
        let mut bytes = vec![0u8; self.portal_open.len()];
        reader.read_exact(&mut bytes)?;
        for (slot, &b) in self.portal_open.iter_mut().zip(&bytes) {
            *slot = b != 0;
        }
        self.flood(areas, portals);
        Ok(())
    }
}
