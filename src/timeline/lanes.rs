//! Packing of possibly overlapping events into per-group lanes.
//!
//! Every group is packed independently with first-fit greedy interval
//! colouring: events are visited in start order and each takes the lowest
//! lane that is already free at its start. Visiting intervals by start time
//! makes this optimal, so a group ends up with exactly as many lanes as the
//! largest number of its events open at one instant.

use std::collections::HashSet;

use rayon::prelude::*;

use super::{Event, GROUP_PADDING, LANE_HEIGHT};
use crate::symbols::Symbols;

/// A stacked band of lanes holding all events of one category.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    /// First-appearance index within the current event set.
    pub index: usize,
    /// Maximum number of concurrently open events.
    pub lane_count: u32,
    /// Top of the band's first lane.
    pub y: f32,
    /// Height of the band's lanes, excluding padding.
    pub height: f32,
    pub hidden: bool,
}

impl Group {
    /// Lanes the band occupies on screen. Hidden groups keep a single row.
    pub fn visible_lanes(&self) -> u32 {
        if self.hidden { 1 } else { self.lane_count.max(1) }
    }
}

/// Lane assignment of a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub group: usize,
    pub lane: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneLayout {
    pub groups: Vec<Group>,
    /// One entry per input event, in input order.
    pub placements: Vec<Placement>,
    /// Total height of all bands including padding.
    pub height: f32,
}

impl LaneLayout {
    /// Pack `events` into lanes and stack the resulting group bands.
    pub fn assign(events: &[Event]) -> Self {
        let mut symbols = Symbols::new();
        let mut members: Vec<Vec<usize>> = Vec::new();

        for (index, event) in events.iter().enumerate() {
            let symbol = symbols.intern(&event.group);
            if symbol.index() == members.len() {
                members.push(Vec::new());
            }
            members[symbol.index()].push(index);
        }

        let packed: Vec<(Vec<u32>, u32)> = members
            .par_iter()
            .map(|indices| {
                let spans: Vec<(f64, f64)> = indices
                    .iter()
                    .map(|&i| (events[i].start, events[i].stop))
                    .collect();
                pack(&spans)
            })
            .collect();

        let mut placements = vec![Placement { group: 0, lane: 0 }; events.len()];
        let mut groups = Vec::with_capacity(packed.len());

        for (index, ((lanes, lane_count), name)) in
            packed.into_iter().zip(symbols.into_names()).enumerate()
        {
            for (&event, lane) in members[index].iter().zip(lanes) {
                placements[event] = Placement { group: index, lane };
            }
            groups.push(Group {
                name,
                index,
                lane_count,
                y: 0.0,
                height: 0.0,
                hidden: false,
            });
        }

        let mut layout = LaneLayout {
            groups,
            placements,
            height: 0.0,
        };
        layout.stack(&HashSet::new());
        layout
    }

    /// Recompute band offsets, collapsing the groups named in `hidden`.
    pub fn stack(&mut self, hidden: &HashSet<String>) {
        let mut y = 0.0;
        for group in &mut self.groups {
            group.hidden = hidden.contains(&group.name);
            group.y = y + GROUP_PADDING;
            group.height = group.visible_lanes() as f32 * LANE_HEIGHT;
            y += group.height + 2.0 * GROUP_PADDING;
        }
        self.height = y;
    }

    /// Absolute top of the lane holding event `index`.
    pub fn event_y(&self, index: usize) -> Option<f32> {
        let placement = self.placements.get(index)?;
        let group = self.groups.get(placement.group)?;
        if group.hidden {
            return None;
        }
        Some(group.y + placement.lane as f32 * LANE_HEIGHT)
    }

    pub fn group_at(&self, y: f32) -> Option<&Group> {
        self.groups
            .iter()
            .find(|group| {
                y >= group.y - GROUP_PADDING && y < group.y + group.height + GROUP_PADDING
            })
    }
}

/// First-fit packing of `(start, stop)` spans. Returns the lane of every span
/// in input order and the number of lanes used.
fn pack(spans: &[(f64, f64)]) -> (Vec<u32>, u32) {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    // Stable sort keeps original order for equal starts.
    order.sort_by(|&a, &b| spans[a].0.total_cmp(&spans[b].0));

    let mut lane_ends: Vec<f64> = Vec::new();
    let mut lanes = vec![0u32; spans.len()];

    for index in order {
        let (start, stop) = spans[index];
        // Malformed spans collapse to a point at their start.
        let stop = stop.max(start);

        let lane = match lane_ends.iter().position(|&end| end <= start) {
            Some(lane) => {
                lane_ends[lane] = stop;
                lane
            }
            None => {
                lane_ends.push(stop);
                lane_ends.len() - 1
            }
        };
        lanes[index] = lane as u32;
    }

    (lanes, lane_ends.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::EventKind;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn event(group: &str, start: f64, stop: f64) -> Event {
        Event {
            id: format!("{group}_{start}_{stop}"),
            group: group.to_string(),
            kind: EventKind::Single,
            modifier: "DQL".to_string(),
            start,
            stop,
            flagged: false,
        }
    }

    fn lanes_of(layout: &LaneLayout) -> Vec<u32> {
        layout.placements.iter().map(|p| p.lane).collect()
    }

    /// Largest number of spans open at one instant, checked at every start.
    fn max_open(spans: &[(f64, f64)]) -> u32 {
        spans
            .iter()
            .map(|&(t, _)| {
                spans
                    .iter()
                    .filter(|&&(start, stop)| start <= t && t < stop)
                    .count() as u32
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn reuses_lanes_after_overlap_ends() {
        let events = vec![event("A", 0.0, 10.0), event("A", 5.0, 15.0), event("A", 20.0, 25.0)];
        let layout = LaneLayout::assign(&events);
        assert_eq!(lanes_of(&layout), vec![0, 1, 0]);
        assert_eq!(layout.groups.len(), 1);
        assert_eq!(layout.groups[0].lane_count, 2);
    }

    #[test]
    fn empty_input_has_no_groups() {
        let layout = LaneLayout::assign(&[]);
        assert!(layout.groups.is_empty());
        assert!(layout.placements.is_empty());
        assert_eq!(layout.height, 0.0);
    }

    #[test]
    fn single_event_gets_one_lane() {
        let layout = LaneLayout::assign(&[event("A", 3.0, 4.0)]);
        assert_eq!(lanes_of(&layout), vec![0]);
        assert_eq!(layout.groups[0].lane_count, 1);
        assert_eq!(layout.height, LANE_HEIGHT + 2.0 * GROUP_PADDING);
    }

    #[test]
    fn groups_are_packed_independently() {
        let events = vec![
            event("sessions", 0.0, 10.0),
            event("queries", 0.0, 10.0),
            event("sessions", 1.0, 2.0),
            event("queries", 10.0, 12.0),
        ];
        let layout = LaneLayout::assign(&events);
        assert_eq!(layout.groups[0].name, "sessions");
        assert_eq!(layout.groups[1].name, "queries");
        assert_eq!(layout.groups[0].lane_count, 2);
        assert_eq!(layout.groups[1].lane_count, 1);
        assert_eq!(lanes_of(&layout), vec![0, 0, 1, 0]);
        assert_eq!(layout.placements[3].group, 1);
    }

    #[test]
    fn malformed_interval_is_treated_as_point() {
        let events = vec![event("A", 10.0, 2.0), event("A", 10.0, 20.0)];
        let layout = LaneLayout::assign(&events);
        assert_eq!(lanes_of(&layout), vec![0, 0]);
        assert_eq!(layout.groups[0].lane_count, 1);
    }

    #[test]
    fn ties_keep_input_order() {
        let events = vec![event("A", 5.0, 6.0), event("A", 5.0, 7.0), event("A", 5.0, 8.0)];
        let layout = LaneLayout::assign(&events);
        assert_eq!(lanes_of(&layout), vec![0, 1, 2]);
    }

    #[test]
    fn bands_stack_with_padding() {
        let events = vec![
            event("A", 0.0, 10.0),
            event("A", 5.0, 15.0),
            event("B", 0.0, 1.0),
        ];
        let layout = LaneLayout::assign(&events);
        let a = &layout.groups[0];
        let b = &layout.groups[1];
        assert_eq!(a.y, GROUP_PADDING);
        assert_eq!(a.height, 2.0 * LANE_HEIGHT);
        assert_eq!(b.y, a.y + a.height + 2.0 * GROUP_PADDING);
        assert_eq!(layout.height, 3.0 * LANE_HEIGHT + 4.0 * GROUP_PADDING);
        assert_eq!(layout.event_y(1), Some(a.y + LANE_HEIGHT));
    }

    #[test]
    fn hidden_groups_collapse_but_keep_lane_count() {
        let events = vec![event("A", 0.0, 10.0), event("A", 5.0, 15.0), event("B", 0.0, 1.0)];
        let mut layout = LaneLayout::assign(&events);
        layout.stack(&HashSet::from(["A".to_string()]));
        assert!(layout.groups[0].hidden);
        assert_eq!(layout.groups[0].lane_count, 2);
        assert_eq!(layout.groups[0].height, LANE_HEIGHT);
        assert_eq!(layout.event_y(0), None);
        assert_eq!(layout.height, 2.0 * LANE_HEIGHT + 4.0 * GROUP_PADDING);
    }

    #[test]
    fn random_sets_never_share_lanes_and_use_minimal_count() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let count = rng.gen_range(1..40_usize);
            let spans: Vec<(f64, f64)> = (0..count)
                .map(|_| {
                    let start = rng.gen_range(0..100_u32) as f64;
                    let length = rng.gen_range(1..30_u32) as f64;
                    (start, start + length)
                })
                .collect();
            let events: Vec<Event> = spans
                .iter()
                .map(|&(start, stop)| event("A", start, stop))
                .collect();

            let layout = LaneLayout::assign(&events);

            for (i, a) in spans.iter().enumerate() {
                for (j, b) in spans.iter().enumerate().skip(i + 1) {
                    let overlap = a.0 < b.1 && b.0 < a.1;
                    if overlap {
                        assert_ne!(
                            layout.placements[i].lane, layout.placements[j].lane,
                            "{a:?} and {b:?} share a lane"
                        );
                    }
                }
            }
            assert_eq!(layout.groups[0].lane_count, max_open(&spans));
        }
    }

    #[test]
    fn group_lookup_by_height() {
        let events = vec![event("A", 0.0, 1.0), event("B", 0.0, 1.0)];
        let layout = LaneLayout::assign(&events);
        let b = &layout.groups[1];
        assert_eq!(layout.group_at(b.y + 1.0).map(|g| g.name.as_str()), Some("B"));
        assert_eq!(layout.group_at(layout.height + 50.0), None);
    }
}
