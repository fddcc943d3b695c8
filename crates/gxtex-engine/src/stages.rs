//! Texture-unit enable tracking.

use crate::gfx::{GraphicsApi, TextureTarget};

pub const MAX_STAGES: u32 = 32;

/// Mirrors which texture targets are enabled on each unit so redundant
/// enable/disable calls never reach the API.
///
/// The caller selects the active unit before `enable_*`; `disable_stage`
/// selects it itself.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageTracker {
    tex_2d: u32,
    tex_rect: u32,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn bit(stage: u32) -> Option<u32> {
        if stage < MAX_STAGES {
            Some(1 << stage)
        } else {
            log::warn!("texture stage {stage} out of range");
            None
        }
    }

    pub fn enable_tex_2d<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, stage: u32) {
        let Some(bit) = Self::bit(stage) else { return };
        if self.tex_2d & bit == 0 {
            self.tex_2d |= bit;
            api.enable(TextureTarget::Tex2D);
        }
        if self.tex_rect & bit != 0 {
            self.tex_rect &= !bit;
            api.disable(TextureTarget::Rect);
        }
    }

    pub fn enable_tex_rect<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, stage: u32) {
        let Some(bit) = Self::bit(stage) else { return };
        if self.tex_2d & bit != 0 {
            self.tex_2d &= !bit;
            api.disable(TextureTarget::Tex2D);
        }
        if self.tex_rect & bit == 0 {
            self.tex_rect |= bit;
            api.enable(TextureTarget::Rect);
        }
    }

    pub fn disable_stage<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, stage: u32) {
        let Some(bit) = Self::bit(stage) else { return };
        let mut selected = false;
        if self.tex_2d & bit != 0 {
            self.tex_2d &= !bit;
            api.active_texture(stage);
            api.disable(TextureTarget::Tex2D);
            selected = true;
        }
        if self.tex_rect & bit != 0 {
            self.tex_rect &= !bit;
            if !selected {
                api.active_texture(stage);
            }
            api.disable(TextureTarget::Rect);
        }
    }

    /// Disables every stage that still has a target enabled.
    pub fn disable_all<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) {
        let mut pending = self.tex_2d | self.tex_rect;
        while pending != 0 {
            let stage = pending.trailing_zeros();
            self.disable_stage(api, stage);
            pending &= pending - 1;
        }
    }

    pub fn is_enabled(&self, stage: u32, target: TextureTarget) -> bool {
        if stage >= MAX_STAGES {
            return false;
        }
        let mask = match target {
            TextureTarget::Tex2D => self.tex_2d,
            TextureTarget::Rect => self.tex_rect,
        };
        mask & (1 << stage) != 0
    }

    pub fn masks(&self) -> (u32, u32) {
        (self.tex_2d, self.tex_rect)
    }
}
