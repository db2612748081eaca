use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context, flag::Flags};
use zvid_core::RgbFrame;

struct ScalerState {
    context: Context,
    src_format: Pixel,
    src_width: u32,
    src_height: u32,
}

/// Resizes decoded frames to the display size with area averaging and
/// converts them to tightly packed RGB24.
///
/// The swscale context is rebuilt whenever the source format or size changes
/// mid-stream.
pub struct RgbScaler {
    width: u32,
    height: u32,
    state: Option<ScalerState>,
}

impl RgbScaler {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: None,
        }
    }

    pub fn scale(&mut self, frame: &ffmpeg_next::frame::Video) -> anyhow::Result<RgbFrame> {
        let needs_new = match &self.state {
            Some(s) => {
                s.src_format != frame.format()
                    || s.src_width != frame.width()
                    || s.src_height != frame.height()
            }
            None => true,
        };
        if needs_new {
            log::debug!(
                "scaler {:?} {}x{} -> rgb24 {}x{}",
                frame.format(),
                frame.width(),
                frame.height(),
                self.width,
                self.height
            );
            self.state = Some(ScalerState {
                context: Context::get(
                    frame.format(),
                    frame.width(),
                    frame.height(),
                    Pixel::RGB24,
                    self.width,
                    self.height,
                    Flags::AREA,
                )?,
                src_format: frame.format(),
                src_width: frame.width(),
                src_height: frame.height(),
            });
        }
        let Some(state) = self.state.as_mut() else {
            anyhow::bail!("scaler not initialized");
        };

        let mut converted = ffmpeg_next::frame::Video::empty();
        state.context.run(frame, &mut converted)?;

        // swscale rows may be padded; copy out exactly width * 3 per row
        let row_len = self.width as usize * 3;
        let stride = converted.stride(0);
        let data = converted.data(0);
        let mut rgb = Vec::with_capacity(row_len * self.height as usize);
        for y in 0..self.height as usize {
            let start = y * stride;
            let Some(row) = data.get(start..start + row_len) else {
                anyhow::bail!("scaled frame too short at row {}", y);
            };
            rgb.extend_from_slice(row);
        }
        Ok(RgbFrame::new(rgb, self.width, self.height)?)
    }
}
