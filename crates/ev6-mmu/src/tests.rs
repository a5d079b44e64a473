use super::*;

use proptest::prelude::*;

fn user_rw_flags() -> PteFlags {
    PteFlags::VALID | PteFlags::KRE | PteFlags::KWE | PteFlags::URE | PteFlags::UWE
}

fn insert_data(mmu: &mut Mmu, vaddr: u64, pfn: u32, flags: PteFlags, asn: u8) {
    mmu.tlb_mut(Stream::Data).insert(vaddr, Pte { pfn, flags, asn });
}

#[test]
fn translate_hit_produces_physical_page() {
    let mut mmu = Mmu::new();
    insert_data(&mut mmu, 0x0001_2345_6000, 0x42, user_rw_flags(), 5);
    let map = mmu
        .translate(0x0001_2345_7abc, AccessType::Read, 5, AccessMode::User)
        .unwrap();
    assert_eq!(map.phys_page, 0x42 << PAGE_BITS);
    assert_eq!(map.physical(0x0001_2345_7abc), (0x42 << PAGE_BITS) | 0x1abc);
    assert!(map.prot.contains(Prot::READ | Prot::WRITE));
    assert!(!map.prot.contains(Prot::EXEC));
}

#[test]
fn miss_when_no_entry() {
    let mmu = Mmu::new();
    assert_eq!(
        mmu.translate(0x4000, AccessType::Read, 0, AccessMode::Kernel),
        Err(TranslateFault::Miss)
    );
}

#[test]
fn invalid_entry_is_a_miss() {
    let mut mmu = Mmu::new();
    // Entry present but V clear: indistinguishable from no entry.
    insert_data(&mut mmu, 0x4000, 1, PteFlags::KRE | PteFlags::URE, 0);
    assert_eq!(
        mmu.translate(0x4000, AccessType::Read, 0, AccessMode::Kernel),
        Err(TranslateFault::Miss)
    );
}

#[test]
fn user_store_denied_kernel_allowed() {
    let mut mmu = Mmu::new();
    // Kernel may write, user may only read.
    let flags = PteFlags::VALID | PteFlags::KRE | PteFlags::KWE | PteFlags::URE;
    insert_data(&mut mmu, 0x8000, 2, flags, 5);

    assert!(mmu
        .translate(0x8000, AccessType::Write, 5, AccessMode::Kernel)
        .is_ok());
    match mmu.translate(0x8000, AccessType::Write, 5, AccessMode::User) {
        Err(TranslateFault::AccessViolation { flags: f }) => assert_eq!(f, flags),
        other => panic!("expected access violation, got {other:?}"),
    }
    // Read capability still granted to user.
    let map = mmu
        .translate(0x8000, AccessType::Read, 5, AccessMode::User)
        .unwrap();
    assert!(map.prot.contains(Prot::READ));
    assert!(!map.prot.contains(Prot::WRITE));
}

#[test]
fn asn_mismatch_is_miss_global_is_not() {
    let mut mmu = Mmu::new();
    // Non-global entry under ASN 5 denying user writes.
    let flags = PteFlags::VALID | PteFlags::KRE | PteFlags::KWE | PteFlags::URE;
    insert_data(&mut mmu, 0x8000, 2, flags, 5);

    assert!(matches!(
        mmu.translate(0x8000, AccessType::Write, 5, AccessMode::User),
        Err(TranslateFault::AccessViolation { .. })
    ));
    // Different ASN: the entry is invisible.
    assert_eq!(
        mmu.translate(0x8000, AccessType::Write, 6, AccessMode::User),
        Err(TranslateFault::Miss)
    );

    // Same permissions but ASM: the violation shows through any ASN.
    let mut mmu = Mmu::new();
    insert_data(&mut mmu, 0x8000, 2, flags | PteFlags::ASM, 5);
    for asn in [5u8, 6, 77] {
        assert!(matches!(
            mmu.translate(0x8000, AccessType::Write, asn, AccessMode::User),
            Err(TranslateFault::AccessViolation { .. })
        ));
    }
}

#[test]
fn fault_on_read_write_bits() {
    let mut mmu = Mmu::new();
    let flags = user_rw_flags() | PteFlags::FAULT_ON_WRITE;
    insert_data(&mut mmu, 0x2000, 1, flags, 0);

    assert!(matches!(
        mmu.translate(0x2000, AccessType::Write, 0, AccessMode::Kernel),
        Err(TranslateFault::AccessViolation { .. })
    ));
    // Reads succeed but the capability mask excludes WRITE.
    let map = mmu
        .translate(0x2000, AccessType::Read, 0, AccessMode::Kernel)
        .unwrap();
    assert!(map.prot.contains(Prot::READ) && !map.prot.contains(Prot::WRITE));
}

#[test]
fn execute_ignores_fault_on_bits() {
    let mut mmu = Mmu::new();
    let flags =
        PteFlags::VALID | PteFlags::KRE | PteFlags::FAULT_ON_READ | PteFlags::FAULT_ON_WRITE;
    mmu.tlb_mut(Stream::Instruction)
        .insert(0x2000, Pte { pfn: 1, flags, asn: 0 });
    let map = mmu
        .translate(0x2000, AccessType::Execute, 0, AccessMode::Kernel)
        .unwrap();
    assert_eq!(map.prot, Prot::READ | Prot::EXEC);
}

#[test]
fn granularity_hint_splices_middle_bits() {
    let mut mmu = Mmu::new();
    // gh = 2: 512 KiB page, mask covers bits 18..13.
    let flags = user_rw_flags() | PteFlags::from_bits_retain(2 << 5);
    let pfn = 0x1c0u32;
    insert_data(&mut mmu, 0x80000, pfn, flags, 0);
    let map = mmu
        .translate(0x8a000, AccessType::Read, 0, AccessMode::Kernel)
        .unwrap();
    let mask = ((1u64 << 6) - 1) << 13;
    let expected = (((pfn as u64) << 13) & !mask) | (0x8a000 & mask);
    assert_eq!(map.phys_page, expected);
}

#[test]
fn canonical_check_43_and_48() {
    let mut mmu = Mmu::new();
    // 43-bit mode: bit 42 must propagate through bit 63.
    let bad = 1u64 << 43;
    assert_eq!(
        mmu.translate(bad, AccessType::Read, 0, AccessMode::Kernel),
        Err(TranslateFault::BadVirtualAddress)
    );
    // The same address is canonical under 48-bit addressing.
    mmu.set_va_ctl(Stream::Data, 1);
    assert_eq!(
        mmu.translate(bad, AccessType::Read, 0, AccessMode::Kernel),
        Err(TranslateFault::Miss)
    );
    // Properly sign-extended kernel addresses pass in 43-bit mode.
    mmu.set_va_ctl(Stream::Data, 0);
    assert_eq!(
        mmu.translate(
            0xffff_fc00_0000_2000,
            AccessType::Read,
            0,
            AccessMode::Kernel
        ),
        Err(TranslateFault::Miss)
    );
}

#[test]
fn bad_va_takes_priority_over_cache_contents() {
    let mut mmu = Mmu::new();
    let bad = 1u64 << 43;
    insert_data(&mut mmu, bad, 1, user_rw_flags(), 0);
    assert_eq!(
        mmu.translate(bad, AccessType::Read, 0, AccessMode::Kernel),
        Err(TranslateFault::BadVirtualAddress)
    );
}

#[test]
fn superpage_window_bypasses_the_tlb() {
    let mut mmu = Mmu::new();
    // The large window lives at va[47:46] == 0b10, which is only canonical
    // under 48-bit addressing.
    mmu.set_va_ctl(Stream::Data, 1);
    mmu.tlb_mut(Stream::Data).set_superpage_enable(4);
    let va = 0xffff_8000_0012_6000u64;
    let map = mmu
        .translate(va, AccessType::Write, 9, AccessMode::Kernel)
        .unwrap();
    assert_eq!(map.phys_page, va & 0x0000_08ff_ffff_e000);
    assert!(map.prot.contains(Prot::READ | Prot::WRITE));
    // Kernel-only: user access faults as a violation, not a miss.
    assert!(matches!(
        mmu.translate(va, AccessType::Write, 9, AccessMode::User),
        Err(TranslateFault::AccessViolation { .. })
    ));
    // Disabled window: back to a plain miss.
    mmu.tlb_mut(Stream::Data).set_superpage_enable(0);
    assert_eq!(
        mmu.translate(va, AccessType::Write, 9, AccessMode::Kernel),
        Err(TranslateFault::Miss)
    );
}

#[test]
fn small_superpage_window() {
    let mut mmu = Mmu::new();
    mmu.tlb_mut(Stream::Data).set_superpage_enable(1);
    // va[47:30] == 0x3fffe: the 1 GiB window below the top of the 43-bit
    // space, identity-mapped through the low 30 bits.
    let va = 0xffff_ffff_8012_6000u64;
    let map = mmu
        .translate(va, AccessType::Read, 0, AccessMode::Kernel)
        .unwrap();
    assert_eq!(map.phys_page, va & 0x0000_0000_3fff_e000);
}

#[test]
fn mid_superpage_window_sign_adjusts() {
    let mut mmu = Mmu::new();
    mmu.set_va_ctl(Stream::Data, 1); // 48-bit canonical form
    mmu.tlb_mut(Stream::Data).set_superpage_enable(2);
    // va[47:41] == 0x7e.
    let va = 0xffff_fc00_0034_a000u64;
    let map = mmu
        .translate(va, AccessType::Read, 0, AccessMode::Kernel)
        .unwrap();
    let adjusted = (((va as i64) << 23) >> 23) as u64;
    assert_eq!(map.phys_page, adjusted & 0x0000_08ff_ffff_e000);
}

#[test]
fn va_form_layouts() {
    let vptb = 0xffff_fffe_1234_0000u64;
    // 43-bit form: low PTE-index bits under the base.
    let f = va_form(0x0000_0400_0000_2000, vptb & 0xffff_fffe_0000_0000, 0);
    assert_eq!(f & 0xffff_fffe_0000_0000, vptb & 0xffff_fffe_0000_0000);
    assert_eq!(f & 7, 0);
    // 32-bit form masks the index much tighter.
    let f32form = va_form(0x0000_0000_8000_2000, 0xffff_ffff_c000_0000, 2);
    assert_eq!(f32form & 0xffff_ffff_c000_0000, 0xffff_ffff_c000_0000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // An address translates to BadVirtualAddress exactly when it fails the
    // canonical sign-extension check, regardless of cache contents.
    #[test]
    fn canonical_check_matches_sign_extension(addr in any::<u64>(), wide in any::<bool>()) {
        let mut mmu = Mmu::new();
        mmu.set_va_ctl(Stream::Data, wide as u8);
        // Populate the slot the address would land in, to show priority.
        insert_data(&mut mmu, addr, 1, user_rw_flags(), 0);

        let sh = if wide { 64 - 48 } else { 64 - 43 };
        let canonical = ((addr as i64) << sh) >> sh == addr as i64;
        let got = mmu.translate(addr, AccessType::Read, 0, AccessMode::Kernel);
        if canonical {
            prop_assert_ne!(got, Err(TranslateFault::BadVirtualAddress));
        } else {
            prop_assert_eq!(got, Err(TranslateFault::BadVirtualAddress));
        }
    }

    // Inserting then looking up the same page always hits, for every
    // granularity hint and any in-page offset.
    #[test]
    fn insert_lookup_idempotent(page in 0u64..(1 << 28), gh in 0u8..4, offset in 0u64..(1 << 13)) {
        let mut mmu = Mmu::new();
        let flags = user_rw_flags() | PteFlags::from_bits_retain((gh as u16) << 5);
        let vaddr = page << 13;
        insert_data(&mut mmu, vaddr, 1, flags, 3);
        prop_assert!(mmu.tlb(Stream::Data).lookup(vaddr | offset, 3).is_some());
    }
}
