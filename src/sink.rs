use async_trait::async_trait;
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use crate::error::Result;

/// SampleSink is the outbound end of the pacing loop
#[async_trait]
pub trait SampleSink {
    async fn write_sample(&self, sample: &Sample) -> Result<()>;
}

#[async_trait]
impl SampleSink for TrackLocalStaticSample {
    async fn write_sample(&self, sample: &Sample) -> Result<()> {
        TrackLocalStaticSample::write_sample(self, sample).await?;
        Ok(())
    }
}
