//! Controller registers and the power-on register table

pub const PANEL_SETTING: u8 = 0x00;
pub const POWER_SETTING: u8 = 0x01;
pub const POWER_OFF: u8 = 0x02;
pub const POWER_OFF_SEQUENCE: u8 = 0x03;
pub const POWER_ON: u8 = 0x04;
pub const BOOSTER_SOFT_START_1: u8 = 0x05;
pub const BOOSTER_SOFT_START_2: u8 = 0x06;
pub const DEEP_SLEEP: u8 = 0x07;
pub const BOOSTER_SOFT_START_3: u8 = 0x08;
pub const DATA_START: u8 = 0x10;
pub const DISPLAY_REFRESH: u8 = 0x12;
pub const PLL_CONTROL: u8 = 0x30;
pub const VCOM_DATA_INTERVAL: u8 = 0x50;
pub const TCON_SETTING: u8 = 0x60;
pub const RESOLUTION: u8 = 0x61;
pub const TEMP_VCOM_DC: u8 = 0x84;
pub const COMMAND_HEADER: u8 = 0xAA;
pub const POWER_SAVING: u8 = 0xE3;

/// Booster phase 2 is re-sent before every refresh
pub const BOOSTER_2_PARAMS: [u8; 4] = [0x6F, 0x1F, 0x17, 0x49];

/// Deep sleep only latches with this check code
pub const DEEP_SLEEP_CHECK: u8 = 0xA5;

/// Registers written after a hardware reset, in order
pub const INIT_SEQUENCE: &[(u8, &[u8])] = &[
    (COMMAND_HEADER, &[0x49, 0x55, 0x20, 0x08, 0x09, 0x18]),
    (POWER_SETTING, &[0x3F]),
    (PANEL_SETTING, &[0x5F, 0x69]),
    (POWER_OFF_SEQUENCE, &[0x00, 0x54, 0x00, 0x44]),
    (BOOSTER_SOFT_START_1, &[0x40, 0x1F, 0x1F, 0x2C]),
    (BOOSTER_SOFT_START_2, &BOOSTER_2_PARAMS),
    (BOOSTER_SOFT_START_3, &[0x6F, 0x1F, 0x1F, 0x22]),
    (PLL_CONTROL, &[0x08]),
    (VCOM_DATA_INTERVAL, &[0x3F]),
    (TCON_SETTING, &[0x02, 0x00]),
    // 800 x 480, big endian
    (RESOLUTION, &[0x03, 0x20, 0x01, 0xE0]),
    (TEMP_VCOM_DC, &[0x01]),
    (POWER_SAVING, &[0x2F]),
];
