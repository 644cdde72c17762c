#![no_std]
#![no_main]

use aya_ebpf::{
    bindings::xdp_action,
    macros::{map, xdp},
    maps::PerCpuArray,
    programs::XdpContext,
};
use pktcount_ebpf_common::{COUNTER_KEY, COUNTER_MAX_ENTRIES};

/// CPU별 패킷 카운터
#[map(name = "PKT_COUNT")]
static PKT_COUNT: PerCpuArray<u64> = PerCpuArray::with_max_entries(COUNTER_MAX_ENTRIES, 0);

/// XDP 패킷 카운터 프로그램
///
/// 수신 패킷마다 현재 CPU 슬롯을 1 증가시키고 항상 통과시킵니다.
#[xdp]
pub fn count_packets(_ctx: XdpContext) -> u32 {
    if let Some(count) = PKT_COUNT.get_ptr_mut(COUNTER_KEY) {
        // SAFETY: PerCpuArray 슬롯은 현재 CPU 전용이며 맵 수명 동안 유효합니다.
        unsafe { *count += 1 };
    }
    xdp_action::XDP_PASS
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[unsafe(link_section = "license")]
#[unsafe(no_mangle)]
static LICENSE: [u8; 4] = *b"GPL\0";
