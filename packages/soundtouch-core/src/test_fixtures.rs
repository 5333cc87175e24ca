//! Shared XML fixtures for device responses and push event envelopes.
//!
//! These constants are used by multiple test modules to avoid duplication.
//! Payloads follow the shapes captured from a SoundTouch 10 on firmware 27.

/// `GET /volume` response.
pub const VOLUME_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<volume deviceID="689E19B8BB8A">
  <targetvolume>32</targetvolume>
  <actualvolume>30</actualvolume>
  <muteenabled>false</muteenabled>
</volume>"#;

/// Error document returned for an out-of-range volume.
pub const ERRORS_INVALID_VOLUME: &str = r#"<errors deviceID="689E19B8BB8A"><error value="1019" name="CLIENT_XML_ERROR" severity="Unknown">Volume out of range</error></errors>"#;

/// `GET /info` response.
pub const INFO_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<info deviceID="689E19B8BB8A">
  <name>Kitchen</name>
  <type>SoundTouch 10</type>
  <margeAccountUUID>3230304</margeAccountUUID>
  <components>
    <component>
      <componentCategory>SCM</componentCategory>
      <softwareVersion>27.0.6.46330.5043500 epdbuild.trunk.hepdswbld04.2022-08-04T11:20:29</softwareVersion>
      <serialNumber>I6332527703739342000020</serialNumber>
    </component>
  </components>
  <networkInfo type="SCM">
    <macAddress>689E19B8BB8A</macAddress>
    <ipAddress>192.168.1.131</ipAddress>
  </networkInfo>
</info>"#;

/// `GET /now_playing` response while streaming.
pub const NOW_PLAYING_RESPONSE: &str = r#"<nowPlaying deviceID="689E19B8BB8A" source="TUNEIN" sourceAccount="">
  <ContentItem source="TUNEIN" type="stationurl" location="/v1/playback/station/s33828" sourceAccount="" isPresetable="true">
    <itemName>K-LOVE Radio</itemName>
    <containerArt>http://cdn-profiles.tunein.com/s33828/images/logoq.png</containerArt>
  </ContentItem>
  <track>Love Song</track>
  <artist>Example Artist</artist>
  <album>Example Album</album>
  <stationName>K-LOVE Radio</stationName>
  <art artImageStatus="IMAGE_PRESENT">http://cdn-profiles.tunein.com/s33828/images/logog.png</art>
  <playStatus>PLAY_STATE</playStatus>
  <streamType>RADIO_STREAMING</streamType>
</nowPlaying>"#;

/// `GET /now_playing` response in standby.
pub const NOW_PLAYING_STANDBY: &str = r#"<nowPlaying deviceID="689E19B8BB8A" source="STANDBY"><ContentItem source="STANDBY" isPresetable="false" /></nowPlaying>"#;

/// `GET /presets` response with two slots filled.
pub const PRESETS_RESPONSE: &str = r#"<presets>
  <preset id="1" createdOn="1701220500" updatedOn="1701220500">
    <ContentItem source="TUNEIN" type="stationurl" location="/v1/playback/station/s33828" sourceAccount="" isPresetable="true">
      <itemName>K-LOVE Radio</itemName>
    </ContentItem>
  </preset>
  <preset id="2" createdOn="1701220600" updatedOn="1701220700">
    <ContentItem source="SPOTIFY" type="tracklisturl" location="/playback/container/c3BvdGlmeQ==" sourceAccount="user@example.com" isPresetable="true">
      <itemName>Morning Mix</itemName>
    </ContentItem>
  </preset>
</presets>"#;

/// `GET /getZone` response for a two-speaker zone.
pub const ZONE_RESPONSE: &str = r#"<zone master="689E19B8BB8A" senderIPAddress="192.168.1.131">
  <member ipaddress="192.168.1.131">689E19B8BB8A</member>
  <member ipaddress="192.168.1.132">A81B6A536A98</member>
</zone>"#;

// ─────────────────────────────────────────────────────────────────────────────
// Push Event Envelopes
// ─────────────────────────────────────────────────────────────────────────────

/// Volume change with device `X`.
pub const VOLUME_UPDATED: &str = r#"<updates deviceID="X"><volumeUpdated deviceID="X"><volume deviceID="X"><targetvolume>25</targetvolume><actualvolume>25</actualvolume><muteenabled>false</muteenabled></volume></volumeUpdated></updates>"#;

/// Track change.
pub const NOW_PLAYING_UPDATED: &str = r#"<updates deviceID="689E19B8BB8A">
  <nowPlayingUpdated deviceID="689E19B8BB8A">
    <nowPlaying deviceID="689E19B8BB8A" source="SPOTIFY" sourceAccount="user@example.com">
      <ContentItem source="SPOTIFY" type="uri" location="spotify:track:4uLU6hMCjMI75M1A2tKUQC" sourceAccount="user@example.com" isPresetable="true">
        <itemName>Never Gonna Give You Up</itemName>
      </ContentItem>
      <track>Never Gonna Give You Up</track>
      <artist>Rick Astley</artist>
      <album>Whenever You Need Somebody</album>
      <art artImageStatus="IMAGE_PRESENT">https://i.scdn.co/image/ab67616d0000b273</art>
      <playStatus>PAUSE_STATE</playStatus>
      <shuffleSetting>SHUFFLE_OFF</shuffleSetting>
      <repeatSetting>REPEAT_OFF</repeatSetting>
      <streamType>TRACK_ONDEMAND</streamType>
    </nowPlaying>
  </nowPlayingUpdated>
</updates>"#;

/// Device network state change.
pub const CONNECTION_STATE_UPDATED: &str = r#"<updates deviceID="689E19B8BB8A"><connectionStateUpdated state="NETWORK_WIFI_CONNECTED" up="true" signal="MARGINAL_SIGNAL" /></updates>"#;

/// Preset slot 3 stored.
pub const PRESET_UPDATED: &str = r#"<updates deviceID="689E19B8BB8A"><presetUpdated><preset id="3" createdOn="1701220800" updatedOn="1701220800"><ContentItem source="INTERNET_RADIO" location="4712" isPresetable="true"><itemName>Jazz FM</itemName></ContentItem></preset></presetUpdated></updates>"#;

/// Zone membership change.
pub const ZONE_UPDATED: &str = r#"<updates deviceID="689E19B8BB8A"><zoneUpdated><zone master="689E19B8BB8A"><member ipaddress="192.168.1.131">689E19B8BB8A</member><member ipaddress="192.168.1.132">A81B6A536A98</member></zone></zoneUpdated></updates>"#;

/// Zone dissolved.
pub const ZONE_UPDATED_EMPTY: &str = r#"<updates deviceID="689E19B8BB8A"><zoneUpdated><zone /></zoneUpdated></updates>"#;

/// Bass change.
pub const BASS_UPDATED: &str = r#"<updates deviceID="689E19B8BB8A"><bassUpdated deviceID="689E19B8BB8A"><bass deviceID="689E19B8BB8A"><targetbass>-3</targetbass><actualbass>-3</actualbass></bass></bassUpdated></updates>"#;

/// Envelope carrying only a child this library does not model.
pub const RECENTS_UPDATED: &str = r#"<updates deviceID="689E19B8BB8A"><recentsUpdated><recents><recent deviceID="689E19B8BB8A" utcTime="1701220900" id="2478"><contentItem source="TUNEIN" location="/v1/playback/station/s33828" isPresetable="true"><itemName>K-LOVE Radio</itemName></contentItem></recent></recents></recentsUpdated></updates>"#;

/// Envelope with two recognized children and one unknown child.
pub const VOLUME_AND_BASS_UPDATED: &str = r#"<updates deviceID="689E19B8BB8A"><volumeUpdated><volume deviceID="689E19B8BB8A"><targetvolume>40</targetvolume><actualvolume>38</actualvolume><muteenabled>true</muteenabled></volume></volumeUpdated><userActivityUpdate /><bassUpdated><bass deviceID="689E19B8BB8A"><targetbass>2</targetbass><actualbass>1</actualbass></bass></bassUpdated></updates>"#;

/// Greeting the device sends when a WebSocket session opens.
pub const SDK_INFO: &str = r#"<SoundTouchSdkInfo serverVersion="4" serverBuild="trunk r42017 v4 epdbuild cepeswbld02" />"#;
