//! RN52 command surface on top of a [`CommandChannel`].
//!
//! Each method is one request/reply exchange, or a read-modify-write of a
//! register word. Register writes are not serialized against other callers:
//! two call sites updating different bits of the same word can lose an
//! update.

use embedded_hal::delay::DelayNs;
use rn52_proto::reply::{CONNECTION_SEGMENTS, METADATA_SEGMENTS};
use rn52_proto::{
    field, parse_decimal, AudioRouting, EventRegister, ExtFeatures, GpioWord, MacAddress, Request,
    Verb,
};

use crate::channel::{Block, ChannelError, CommandChannel, Line, Requery};
use crate::platform::Monotonic;
use crate::stream::ByteStream;

/// Hex characters in a GPIO level report.
const GPIO_WORD_DIGITS: usize = 4;

/// Driver for one RN52 module.
pub struct Rn52<S, C, D> {
    channel: CommandChannel<S, C, D>,
    direction: GpioWord,
    levels: GpioWord,
    track_changed: bool,
}

impl<S, C, D> Rn52<S, C, D>
where
    S: ByteStream,
    C: Monotonic,
    D: DelayNs,
{
    pub fn new(channel: CommandChannel<S, C, D>) -> Self {
        Self {
            channel,
            direction: GpioWord::DIRECTION,
            levels: GpioWord::LEVELS,
            track_changed: false,
        }
    }

    pub fn channel(&mut self) -> &mut CommandChannel<S, C, D> {
        &mut self.channel
    }

    pub fn release(self) -> CommandChannel<S, C, D> {
        self.channel
    }

    // --- identity and power ---

    /// Device name as reported by `GN`.
    pub fn name(&mut self) -> Result<Line, ChannelError> {
        self.channel.query_line(&Request::new(Verb::GetName))
    }

    /// Set the device name. A normalized name gets the last MAC digits
    /// appended by the module.
    pub fn set_name(&mut self, name: &str, normalized: bool) -> Result<(), ChannelError> {
        let verb = if normalized {
            Verb::SetNameNormalized
        } else {
            Verb::SetName
        };
        self.channel.command(&Request::new(verb).arg(name)?)
    }

    pub fn set_discoverable(&mut self, discoverable: bool) -> Result<(), ChannelError> {
        self.channel
            .command(&Request::new(Verb::Discoverable).flag(discoverable)?)
    }

    pub fn toggle_echo(&mut self) -> Result<(), ChannelError> {
        self.channel.command(&Request::new(Verb::ToggleEcho))
    }

    /// Restore factory settings. Takes effect after [`reboot`](Self::reboot).
    pub fn factory_reset(&mut self) -> Result<(), ChannelError> {
        debug!("factory reset");
        self.channel
            .command(&Request::new(Verb::FactoryReset).flag(true)?)
    }

    /// Reboot and wait for the module to come back.
    pub fn reboot(&mut self) -> Result<(), ChannelError> {
        debug!("rebooting module");
        let settle = self.channel.config().reboot_settle_ms;
        self.channel
            .command_settle(&Request::new(Verb::Reboot).flag(true)?, settle)
    }

    /// Idle power-down timer setting.
    pub fn idle_power_down_time(&mut self) -> Result<u32, ChannelError> {
        self.channel
            .query_decimal(&Request::new(Verb::GetIdlePowerDown))
    }

    pub fn set_idle_power_down_time(&mut self, timer: u16) -> Result<(), ChannelError> {
        self.channel
            .command(&Request::new(Verb::SetIdlePowerDown).decimal(u32::from(timer))?)
    }

    // --- calls and transport ---

    pub fn call(&mut self, number: &str) -> Result<(), ChannelError> {
        self.channel.command(&Request::new(Verb::Call).arg(number)?)
    }

    pub fn end_call(&mut self) -> Result<(), ChannelError> {
        self.channel.command(&Request::new(Verb::EndCall))
    }

    pub fn play_pause(&mut self) -> Result<(), ChannelError> {
        self.channel.command(&Request::new(Verb::PlayPause))
    }

    pub fn next_track(&mut self) -> Result<(), ChannelError> {
        self.channel.command(&Request::new(Verb::NextTrack))
    }

    pub fn prev_track(&mut self) -> Result<(), ChannelError> {
        self.channel.command(&Request::new(Verb::PrevTrack))
    }

    pub fn volume_up(&mut self) -> Result<(), ChannelError> {
        self.channel.command(&Request::new(Verb::VolumeUp))
    }

    pub fn volume_down(&mut self) -> Result<(), ChannelError> {
        self.channel.command(&Request::new(Verb::VolumeDown))
    }

    // --- metadata ---

    /// Raw `AD` block: up to eight `Key=Value` lines.
    pub fn metadata(&mut self) -> Result<Block, ChannelError> {
        self.channel
            .query_block(&Request::new(Verb::Metadata), METADATA_SEGMENTS)
    }

    /// Current track title, empty if the source did not send one.
    pub fn track_title(&mut self) -> Result<Line, ChannelError> {
        self.metadata_text("Title=")
    }

    pub fn album(&mut self) -> Result<Line, ChannelError> {
        self.metadata_text("Album=")
    }

    pub fn artist(&mut self) -> Result<Line, ChannelError> {
        self.metadata_text("Artist=")
    }

    pub fn genre(&mut self) -> Result<Line, ChannelError> {
        self.metadata_text("Genre=")
    }

    /// Track number, asked for again while it reads 0.
    pub fn track_number(&mut self) -> Result<u32, ChannelError> {
        self.metadata_number("TrackNumber=")
    }

    /// Tracks in the current list, asked for again while it reads 0.
    pub fn track_count(&mut self) -> Result<u32, ChannelError> {
        self.metadata_number("TrackCount=")
    }

    fn metadata_text(&mut self, key: &str) -> Result<Line, ChannelError> {
        let block = self.metadata()?;
        Ok(field(&block, key).map(truncated_line).unwrap_or_default())
    }

    fn metadata_number(&mut self, key: &str) -> Result<u32, ChannelError> {
        self.channel.retry_while(
            |ch| {
                let block = ch.query_block(&Request::new(Verb::Metadata), METADATA_SEGMENTS)?;
                Ok(field(&block, key).map_or(0, parse_decimal))
            },
            |n| *n == 0,
        )
    }

    // --- connection ---

    /// Raw `D` block: up to thirteen `Key=Value` lines.
    pub fn connection_data(&mut self) -> Result<Block, ChannelError> {
        self.channel
            .query_block(&Request::new(Verb::ConnectionData), CONNECTION_SEGMENTS)
    }

    /// Address of the connected peer, `None` if no valid address came back.
    pub fn connected_mac(&mut self) -> Result<Option<MacAddress>, ChannelError> {
        self.channel.retry_while(
            |ch| {
                let block =
                    ch.query_block(&Request::new(Verb::ConnectionData), CONNECTION_SEGMENTS)?;
                Ok(field(&block, "BTAC=").and_then(MacAddress::parse))
            },
            Option::is_none,
        )
    }

    // --- extended features ---

    pub fn ext_features(&mut self) -> Result<ExtFeatures, ChannelError> {
        self.channel
            .query_hex(&Request::new(Verb::GetExtFeatures), Requery::WhileSilent)
            .map(ExtFeatures)
    }

    /// Overwrite the whole extended features word.
    pub fn set_ext_features(&mut self, features: ExtFeatures) -> Result<(), ChannelError> {
        debug!("writing extended features {}", features.raw());
        let settle = self.channel.config().register_settle_ms;
        self.channel.command_settle(
            &Request::new(Verb::SetExtFeatures).hex16(features.raw())?,
            settle,
        )
    }

    /// Whether every bit of `flag` is set.
    pub fn feature(&mut self, flag: ExtFeatures) -> Result<bool, ChannelError> {
        Ok(self.ext_features()?.contains(flag))
    }

    /// Read the features word, change `flag`, write it back. Returns the
    /// word that was written.
    pub fn set_feature(
        &mut self,
        flag: ExtFeatures,
        enabled: bool,
    ) -> Result<ExtFeatures, ChannelError> {
        let updated = self.ext_features()?.with(flag, enabled);
        self.set_ext_features(updated)?;
        Ok(updated)
    }

    // --- event register ---

    /// Read the event register. A raised track-change bit is latched until
    /// [`track_changed`](Self::track_changed) reports it.
    pub fn event_register(&mut self) -> Result<EventRegister, ChannelError> {
        let reg = self
            .channel
            .query_hex(&Request::new(Verb::EventRegister), Requery::WhileSilent)
            .map(EventRegister)?;
        if reg.track_changed() {
            self.track_changed = true;
        }
        Ok(reg)
    }

    /// Whether the track changed since the last call.
    ///
    /// A change already seen by [`event_register`](Self::event_register) is
    /// reported without another query.
    pub fn track_changed(&mut self) -> Result<bool, ChannelError> {
        if core::mem::take(&mut self.track_changed) {
            return Ok(true);
        }
        let changed = self.event_register()?.track_changed();
        self.track_changed = false;
        Ok(changed)
    }

    pub fn is_connected(&mut self) -> Result<bool, ChannelError> {
        Ok(self.event_register()?.is_connected())
    }

    // --- volume and audio routing ---

    pub fn volume_on_startup(&mut self) -> Result<u8, ChannelError> {
        let vol = self
            .channel
            .query_hex(&Request::new(Verb::GetStartupVolume), Requery::Once)?;
        Ok((vol & 0xFF) as u8)
    }

    /// Startup volume level, 0 to 15. Larger values are clamped.
    pub fn set_volume_on_startup(&mut self, level: u8) -> Result<(), ChannelError> {
        self.channel
            .command(&Request::new(Verb::SetStartupVolume).hex8(level.min(0x0F))?)
    }

    pub fn audio_routing(&mut self) -> Result<AudioRouting, ChannelError> {
        self.channel
            .query_hex(&Request::new(Verb::GetAudioRouting), Requery::Once)
            .map(AudioRouting)
    }

    pub fn set_audio_routing(&mut self, routing: AudioRouting) -> Result<(), ChannelError> {
        debug!("writing audio routing {}", routing.raw());
        self.channel
            .command(&Request::new(Verb::SetAudioRouting).hex16(routing.raw())?)
    }

    pub fn sample_rate(&mut self) -> Result<u8, ChannelError> {
        Ok(self.audio_routing()?.sample_rate())
    }

    pub fn set_sample_rate(&mut self, rate: u8) -> Result<(), ChannelError> {
        let routing = self.audio_routing()?.with_sample_rate(rate);
        self.set_audio_routing(routing)
    }

    pub fn sample_width(&mut self) -> Result<u8, ChannelError> {
        Ok(self.audio_routing()?.sample_width())
    }

    pub fn set_sample_width(&mut self, width: u8) -> Result<(), ChannelError> {
        let routing = self.audio_routing()?.with_sample_width(width);
        self.set_audio_routing(routing)
    }

    pub fn a2dp_route(&mut self) -> Result<u8, ChannelError> {
        Ok(self.audio_routing()?.a2dp_route())
    }

    pub fn set_a2dp_route(&mut self, route: u8) -> Result<(), ChannelError> {
        let routing = self.audio_routing()?.with_a2dp_route(route);
        self.set_audio_routing(routing)
    }

    // --- GPIO ---

    /// Make `pin` an output (`true`) or input. Returns whether the module
    /// acknowledged the new direction word.
    pub fn gpio_pin_mode(&mut self, pin: u8, output: bool) -> Result<bool, ChannelError> {
        self.direction.set_pin(pin, output);
        let word = self.direction.wire_value();
        debug!("GPIO direction word {}", word);
        self.channel
            .command_ack(&Request::new(Verb::GpioDirection).hex16(word)?)
    }

    /// Drive an output pin, or toggle the pull-up of an input pin.
    pub fn gpio_write(&mut self, pin: u8, high: bool) -> Result<(), ChannelError> {
        self.levels.set_pin(pin, high);
        let word = self.levels.wire_value();
        debug!("GPIO level word {}", word);
        self.channel
            .command(&Request::new(Verb::GpioLevels).hex16(word)?)
    }

    /// Level of `pin` as reported by the module.
    pub fn gpio_read(&mut self, pin: u8) -> Result<bool, ChannelError> {
        let word = self
            .channel
            .query_hex_digits(&Request::new(Verb::GpioLevels), GPIO_WORD_DIGITS)?;
        Ok(GpioWord::pin_of(word, pin))
    }
}

/// Copy as much of `s` as fits a [`Line`].
fn truncated_line(s: &str) -> Line {
    let mut line = Line::new();
    for c in s.chars() {
        if line.push(c).is_err() {
            break;
        }
    }
    line
}
