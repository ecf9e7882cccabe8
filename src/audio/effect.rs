use super::filter::{Biquad, FilterType};
use super::frame::StereoFrame;
use super::shaper::{shape, DriveSettings};

// high-pass ahead of the shaper so low end doesn't fold into mush
const PRE_EMPHASIS_HZ: f64 = 90.0;
// cabinet-style low-pass after the shaper to take the fizz off
const CABINET_HZ: f64 = 4_500.0;
const BUTTERWORTH_Q: f64 = 0.707;

pub trait Effect: Send {
    fn process(&mut self, buf: &mut [StereoFrame]);
}

// distortion: pre-emphasis -> waveshaper -> cabinet -> makeup
#[derive(Clone, Debug)]
pub struct FxChain {
    drive: DriveSettings,
    pre: [Biquad; 2],
    post: [Biquad; 2],
}

impl FxChain {
    pub fn new(sample_rate: f64) -> Self {
        let hp = Biquad::new(FilterType::Highpass, PRE_EMPHASIS_HZ, BUTTERWORTH_Q, sample_rate);
        let lp = Biquad::new(FilterType::Lowpass, CABINET_HZ, BUTTERWORTH_Q, sample_rate);
        Self {
            drive: DriveSettings::clean(),
            pre: [hp.clone(), hp],
            post: [lp.clone(), lp],
        }
    }

    pub fn set_drive(&mut self, drive: DriveSettings) {
        self.drive = drive;
    }

    pub fn drive(&self) -> &DriveSettings {
        &self.drive
    }
}

impl Effect for FxChain {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        // amount 0 means the shaper node has no curve: leave the signal alone
        let Some(curve) = self.drive.curve.as_deref() else {
            return;
        };
        let pre_gain = self.drive.pre_gain;
        let post_gain = self.drive.post_gain;
        let [pre_l, pre_r] = &mut self.pre;
        let [post_l, post_r] = &mut self.post;
        for f in buf.iter_mut() {
            let l = pre_l.process(f.left as f64) as f32;
            let r = pre_r.process(f.right as f64) as f32;
            let l = shape(curve, l * pre_gain);
            let r = shape(curve, r * pre_gain);
            f.left = post_l.process(l as f64) as f32 * post_gain;
            f.right = post_r.process(r as f64) as f32 * post_gain;
        }
    }
}
