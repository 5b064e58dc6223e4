use std::collections::HashMap;

use notepin_shared::Comment;

use crate::coords::{percent_to_pixels, popover_left, ContentSize, Offset, PIN_SIZE};
use crate::surface::{PinLabel, PinView, PopoverView, Surface};

/// 1-based rank of every comment by ascending `created_at`; ties keep cache order.
pub fn ranks(comments: &[Comment]) -> HashMap<String, usize> {
    let mut order: Vec<&Comment> = comments.iter().collect();
    order.sort_by_key(|comment| comment.created_at);
    order
        .into_iter()
        .enumerate()
        .map(|(index, comment)| (comment.id.clone(), index + 1))
        .collect()
}

pub fn rank_of(comments: &[Comment], id: &str) -> Option<usize> {
    ranks(comments).get(id).copied()
}

#[derive(Clone, Debug, PartialEq)]
struct DrawnPin {
    x: f64,
    y: f64,
    color: String,
    resolved: bool,
    rank: usize,
}

impl DrawnPin {
    fn of(comment: &Comment, rank: usize) -> Self {
        Self {
            x: comment.x,
            y: comment.y,
            color: comment.color_or_default().to_string(),
            resolved: comment.is_resolved(),
            rank,
        }
    }
}

/// Where the surface currently sits relative to the viewport, needed to place popovers.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub size: ContentSize,
    pub origin: Offset,
    pub width: f64,
}

/// Disposable projection of the comment cache onto pin nodes.
#[derive(Debug, Default)]
pub struct PinRenderer {
    drawn: HashMap<String, DrawnPin>,
    active: Option<String>,
    popover: Option<String>,
}

impl PinRenderer {
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn popover(&self) -> Option<&str> {
        self.popover.as_deref()
    }

    fn view(&self, comment: &Comment, rank: usize, size: ContentSize) -> PinView {
        let position = percent_to_pixels(comment.x, comment.y, size);
        let resolved = comment.is_resolved();
        PinView {
            id: comment.id.clone(),
            left: position.x,
            top: position.y,
            color: comment.color_or_default().to_string(),
            rank,
            label: if resolved {
                PinLabel::Resolved
            } else {
                PinLabel::Rank(rank)
            },
            resolved,
            active: self.active.as_deref() == Some(comment.id.as_str()),
        }
    }

    fn draw(&mut self, surface: &dyn Surface, comment: &Comment, rank: usize, size: ContentSize) {
        if self.drawn.contains_key(&comment.id) {
            surface.remove_pin(&comment.id);
        }
        surface.draw_pin(&self.view(comment, rank, size));
        self.drawn
            .insert(comment.id.clone(), DrawnPin::of(comment, rank));
    }

    /// Redraws every pin, dropping nodes whose comment is gone.
    pub fn render_all(&mut self, surface: &dyn Surface, comments: &[Comment], size: ContentSize) {
        let ranks = ranks(comments);
        let stale: Vec<String> = self
            .drawn
            .keys()
            .filter(|id| !ranks.contains_key(*id))
            .cloned()
            .collect();
        for id in stale {
            surface.remove_pin(&id);
            self.drawn.remove(&id);
        }
        for comment in comments {
            let rank = ranks.get(&comment.id).copied().unwrap_or_default();
            self.draw(surface, comment, rank, size);
        }
    }

    /// Draws `id` unconditionally, then redraws any other pin whose rank moved.
    pub fn render_comment(
        &mut self,
        surface: &dyn Surface,
        comments: &[Comment],
        id: &str,
        size: ContentSize,
    ) {
        let ranks = ranks(comments);
        if let Some(comment) = comments.iter().find(|comment| comment.id == id) {
            let rank = ranks.get(id).copied().unwrap_or_default();
            self.draw(surface, comment, rank, size);
        }
        self.sync_ranks(surface, comments, &ranks, size);
    }

    /// Redraws `comment` only if its position, color, resolved flag or rank differ from
    /// what is on screen. Returns whether a redraw happened.
    pub fn refresh_comment(
        &mut self,
        surface: &dyn Surface,
        comments: &[Comment],
        comment: &Comment,
        size: ContentSize,
    ) -> bool {
        let Some(rank) = rank_of(comments, &comment.id) else {
            return false;
        };
        if self.drawn.get(&comment.id) == Some(&DrawnPin::of(comment, rank)) {
            return false;
        }
        self.draw(surface, comment, rank, size);
        true
    }

    fn sync_ranks(
        &mut self,
        surface: &dyn Surface,
        comments: &[Comment],
        ranks: &HashMap<String, usize>,
        size: ContentSize,
    ) {
        for comment in comments {
            let Some(rank) = ranks.get(&comment.id).copied() else {
                continue;
            };
            let moved = self
                .drawn
                .get(&comment.id)
                .is_some_and(|drawn| drawn.rank != rank);
            if moved {
                self.draw(surface, comment, rank, size);
            }
        }
    }

    /// Removes one pin, closing the popover and clearing the active pin if they pointed at it.
    pub fn remove(&mut self, surface: &dyn Surface, id: &str) {
        if self.popover.as_deref() == Some(id) {
            surface.hide_popover();
            self.popover = None;
        }
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        if self.drawn.remove(id).is_some() {
            surface.remove_pin(id);
        }
    }

    /// Makes `comment` the single active pin, optionally opening the popover beside it.
    pub fn activate(
        &mut self,
        surface: &dyn Surface,
        comment: &Comment,
        viewport: Viewport,
        show_popover: bool,
    ) {
        if let Some(previous) = self.active.take() {
            if previous != comment.id {
                surface.set_pin_active(&previous, false);
            }
        }
        if self.popover.take().is_some() {
            surface.hide_popover();
        }
        self.active = Some(comment.id.clone());
        surface.set_pin_active(&comment.id, true);
        if show_popover {
            surface.show_popover(&popover_view(comment, viewport));
            self.popover = Some(comment.id.clone());
        }
    }

    /// Re-places the open popover, if it belongs to `comment`.
    pub fn refresh_popover(&mut self, surface: &dyn Surface, comment: &Comment, viewport: Viewport) {
        if self.popover.as_deref() == Some(comment.id.as_str()) {
            surface.show_popover(&popover_view(comment, viewport));
        }
    }

    pub fn deactivate(&mut self, surface: &dyn Surface) {
        if self.popover.take().is_some() {
            surface.hide_popover();
        }
        if let Some(previous) = self.active.take() {
            surface.set_pin_active(&previous, false);
        }
    }

    /// Forgets every pin without touching the surface; used once the overlay is detached.
    pub fn clear(&mut self) {
        self.drawn.clear();
        self.active = None;
        self.popover = None;
    }
}

fn popover_view(comment: &Comment, viewport: Viewport) -> PopoverView {
    let position = percent_to_pixels(comment.x, comment.y, viewport.size);
    let (left, side) = popover_left(position.x, viewport.origin.x, viewport.width);
    PopoverView {
        comment_id: comment.id.clone(),
        text: comment.text.clone(),
        left,
        top: position.y - PIN_SIZE / 2.0,
        side,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn comment(id: &str, created_at: i64) -> Comment {
        Comment {
            id: id.into(),
            x: 50.0,
            y: 50.0,
            text: id.into(),
            color: None,
            resolved: None,
            created_at,
        }
    }

    #[test]
    fn ranks_follow_creation_time() {
        let comments = vec![comment("late", 30), comment("early", 10), comment("mid", 20)];
        let ranks = ranks(&comments);
        assert_eq!(ranks["early"], 1);
        assert_eq!(ranks["mid"], 2);
        assert_eq!(ranks["late"], 3);
    }

    #[test]
    fn equal_timestamps_rank_in_insertion_order() {
        let comments = vec![comment("first", 5), comment("second", 5), comment("zero", 1)];
        assert_eq!(rank_of(&comments, "zero"), Some(1));
        assert_eq!(rank_of(&comments, "first"), Some(2));
        assert_eq!(rank_of(&comments, "second"), Some(3));
        assert_eq!(rank_of(&comments, "missing"), None);
    }

    #[test]
    fn popover_sits_beside_pin() {
        let viewport = Viewport {
            size: ContentSize::new(400.0, 400.0),
            origin: Offset::default(),
            width: 1200.0,
        };
        let view = popover_view(&comment("a", 1), viewport);
        assert_eq!(view.top, 200.0 - PIN_SIZE / 2.0);
        assert!(view.left > 200.0);
    }
}
