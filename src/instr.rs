//!
//! The instruction descriptor table.
//!
//! Every instruction of the three generations lives in one 16-bit encoding
//! space. Each descriptor gives the fixed bits of the first word, the mask
//! selecting those bits, the instruction length in words, the operand layout
//! and the execution class. Lookup scans the table in order; the first
//! structural match wins, subject to two tie-break rules described on
//! [`find`].
//!

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Layout {
    /// JMP/JSR/ISZ/DSZ: indirect, index mode, 8-bit displacement.
    NovaNoAccEffAddr,
    /// LDA/STA/LEF: as above plus an accumulator.
    NovaOneAccEffAddr,
    /// Two-accumulator multiple operation.
    NovaTwoAccMultOp,
    /// DIA..DOC: accumulator, control flag, device.
    NovaDataIo,
    /// NIO: control flag and device.
    IoFlagsDev,
    /// SKP: test condition and device.
    IoTestDev,
    UniqueOneWord,
    /// One opcode word followed by one 16-bit operand word.
    UniqueTwoWord,
    OneAccOneWord,
    TwoAccOneWord,
    /// Biased 2-bit immediate and one accumulator.
    ImmOneAcc,
    /// Accumulator and sign-extended 16-bit immediate.
    OneAccImm2Word,
    /// Accumulator and unsigned 16-bit immediate.
    OneAccImmWd2Word,
    /// Accumulator and 32-bit immediate.
    OneAccImmDwd3Word,
    /// CIOI: two accumulators and a 16-bit immediate.
    TwoAccImm2Word,
    NoAccModeInd2WordE,
    OneAccModeInd2WordE,
    /// Eclipse byte reference with a 16-bit byte displacement.
    OneAccMode2WordE,
    NoAccModeInd2WordX,
    OneAccModeInd2WordX,
    OneAccMode2WordXB,
    NoAccModeInd3Word,
    OneAccModeInd3Word,
    /// 32-bit byte displacement with an accumulator.
    OneAccMode3Word,
    /// 32-bit byte displacement, no accumulator.
    NoAccMode3Word,
    /// XCALL: 15-bit displacement then argument count.
    NoAccModeInd3WordXcall,
    /// LCALL: 31-bit displacement then argument count.
    NoAccModeInd4WordLcall,
    /// WBR: displacement split across two fields of the opcode.
    SplitEightBitDisp,
    /// WSKBO/WSKBZ: 5-bit bit number and accumulator.
    OneAccBit,
    /// XNDO: termination offset then 15-bit displacement.
    ThreeWordDo,
    /// LNDO: termination offset then 31-bit displacement.
    FourWordDo,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum InstrClass {
    NovaMemRef,
    NovaOp,
    NovaIo,
    NovaPc,
    EclipseMemRef,
    EclipseOp,
    EclipsePc,
    EclipseStack,
    EagleMemRef,
    EagleOp,
    EagleIo,
    EaglePc,
    EagleStack,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Descriptor {
    pub mnemonic: Mnemonic,
    pub bits: u16,
    pub mask: u16,
    pub len: u8,
    pub layout: Layout,
    pub class: InstrClass,
}

macro_rules! instructions {
    ($($mn:ident => ($bits:expr, $mask:expr, $len:expr, $layout:ident, $class:ident),)*) => {
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
        pub enum Mnemonic {
            $($mn,)*
        }

        impl Mnemonic {
            pub fn name(self) -> &'static str {
                match self {
                    $(Mnemonic::$mn => stringify!($mn),)*
                }
            }
        }

        pub static DESCRIPTORS: &[Descriptor] = &[
            $(Descriptor {
                mnemonic: Mnemonic::$mn,
                bits: $bits,
                mask: $mask,
                len: $len,
                layout: Layout::$layout,
                class: InstrClass::$class,
            },)*
        ];
    };
}

instructions! {
    JMP    => (0x0000, 0xf800, 1, NovaNoAccEffAddr, NovaPc),
    JSR    => (0x0800, 0xf800, 1, NovaNoAccEffAddr, NovaPc),
    ISZ    => (0x1000, 0xf800, 1, NovaNoAccEffAddr, NovaMemRef),
    DSZ    => (0x1800, 0xf800, 1, NovaNoAccEffAddr, NovaMemRef),
    LDA    => (0x2000, 0xe000, 1, NovaOneAccEffAddr, NovaMemRef),
    STA    => (0x4000, 0xe000, 1, NovaOneAccEffAddr, NovaMemRef),
    COM    => (0x8000, 0x8700, 1, NovaTwoAccMultOp, NovaOp),
    NEG    => (0x8100, 0x8700, 1, NovaTwoAccMultOp, NovaOp),
    MOV    => (0x8200, 0x8700, 1, NovaTwoAccMultOp, NovaOp),
    INC    => (0x8300, 0x8700, 1, NovaTwoAccMultOp, NovaOp),
    ADC    => (0x8400, 0x8700, 1, NovaTwoAccMultOp, NovaOp),
    SUB    => (0x8500, 0x8700, 1, NovaTwoAccMultOp, NovaOp),
    ADD    => (0x8600, 0x8700, 1, NovaTwoAccMultOp, NovaOp),
    AND    => (0x8700, 0x8700, 1, NovaTwoAccMultOp, NovaOp),
    INTEN  => (0x607f, 0xffff, 1, UniqueOneWord, NovaIo),
    INTDS  => (0x60bf, 0xffff, 1, UniqueOneWord, NovaIo),
    READS  => (0x613f, 0xe7ff, 1, OneAccOneWord, NovaIo),
    INTA   => (0x633f, 0xe7ff, 1, OneAccOneWord, NovaIo),
    MSKO   => (0x643f, 0xe7ff, 1, OneAccOneWord, NovaIo),
    IORST  => (0x653f, 0xe73f, 1, OneAccOneWord, NovaIo),
    HALT   => (0x663f, 0xff3f, 1, UniqueOneWord, NovaIo),
    NCLID  => (0x683f, 0xffff, 1, UniqueOneWord, EagleIo),
    LEF    => (0x6000, 0xe000, 1, NovaOneAccEffAddr, EclipseMemRef),
    NIO    => (0x6000, 0xe700, 1, IoFlagsDev, NovaIo),
    DIA    => (0x6100, 0xe700, 1, NovaDataIo, NovaIo),
    DOA    => (0x6200, 0xe700, 1, NovaDataIo, NovaIo),
    DIB    => (0x6300, 0xe700, 1, NovaDataIo, NovaIo),
    DOB    => (0x6400, 0xe700, 1, NovaDataIo, NovaIo),
    DIC    => (0x6500, 0xe700, 1, NovaDataIo, NovaIo),
    DOC    => (0x6600, 0xe700, 1, NovaDataIo, NovaIo),
    SKP    => (0x6700, 0xe700, 1, IoTestDev, NovaIo),
    ADI    => (0x8008, 0x87ff, 1, ImmOneAcc, EclipseOp),
    SBI    => (0x8048, 0x87ff, 1, ImmOneAcc, EclipseOp),
    IOR    => (0x8108, 0x87ff, 1, TwoAccOneWord, EclipseOp),
    XOR    => (0x8148, 0x87ff, 1, TwoAccOneWord, EclipseOp),
    ANC    => (0x8188, 0x87ff, 1, TwoAccOneWord, EclipseOp),
    XCH    => (0x81c8, 0x87ff, 1, TwoAccOneWord, EclipseOp),
    SGT    => (0x8208, 0x87ff, 1, TwoAccOneWord, EclipsePc),
    SGE    => (0x8248, 0x87ff, 1, TwoAccOneWord, EclipsePc),
    LSH    => (0x8288, 0x87ff, 1, TwoAccOneWord, EclipseOp),
    DLSH   => (0x82c8, 0x87ff, 1, TwoAccOneWord, EclipseOp),
    HXL    => (0x8308, 0x87ff, 1, ImmOneAcc, EclipseOp),
    HXR    => (0x8348, 0x87ff, 1, ImmOneAcc, EclipseOp),
    DHXL   => (0x8388, 0x87ff, 1, ImmOneAcc, EclipseOp),
    DHXR   => (0x83c8, 0x87ff, 1, ImmOneAcc, EclipseOp),
    BTO    => (0x8408, 0x87ff, 1, TwoAccOneWord, EclipseOp),
    BTZ    => (0x8448, 0x87ff, 1, TwoAccOneWord, EclipseOp),
    SZB    => (0x8488, 0x87ff, 1, TwoAccOneWord, EclipsePc),
    SNB    => (0x84c8, 0x87ff, 1, TwoAccOneWord, EclipsePc),
    SZBO   => (0x8508, 0x87ff, 1, TwoAccOneWord, EclipsePc),
    LDB    => (0x8548, 0x87ff, 1, TwoAccOneWord, EclipseMemRef),
    CLM    => (0x8588, 0x87ff, 1, TwoAccOneWord, EclipsePc),
    STB    => (0x85c8, 0x87ff, 1, TwoAccOneWord, EclipseMemRef),
    PSH    => (0x8608, 0x87ff, 1, TwoAccOneWord, EclipseStack),
    POP    => (0x8688, 0x87ff, 1, TwoAccOneWord, EclipseStack),
    MSP    => (0x86c8, 0xe7ff, 1, OneAccOneWord, EclipseStack),
    EJMP   => (0x8438, 0xfcff, 2, NoAccModeInd2WordE, EclipsePc),
    EJSR   => (0x8c38, 0xfcff, 2, NoAccModeInd2WordE, EclipsePc),
    EISZ   => (0x9438, 0xfcff, 2, NoAccModeInd2WordE, EclipsePc),
    EDSZ   => (0x9c38, 0xfcff, 2, NoAccModeInd2WordE, EclipsePc),
    ELDA   => (0xa438, 0xe4ff, 2, OneAccModeInd2WordE, EclipseMemRef),
    ESTA   => (0xc438, 0xe4ff, 2, OneAccModeInd2WordE, EclipseMemRef),
    ELEF   => (0xe438, 0xe4ff, 2, OneAccModeInd2WordE, EclipseMemRef),
    ELDB   => (0x8478, 0xe4ff, 2, OneAccMode2WordE, EclipseMemRef),
    ESTB   => (0xa478, 0xe4ff, 2, OneAccMode2WordE, EclipseMemRef),
    DSPA   => (0xc478, 0xe4ff, 2, OneAccModeInd2WordE, EclipsePc),
    PSHJ   => (0x84b8, 0xfcff, 2, NoAccModeInd2WordE, EclipseStack),
    MUL    => (0xc7c8, 0xffff, 1, UniqueOneWord, EclipseOp),
    MULS   => (0xcfc8, 0xffff, 1, UniqueOneWord, EclipseOp),
    DIV    => (0xd7c8, 0xffff, 1, UniqueOneWord, EclipseOp),
    DIVS   => (0xdfc8, 0xffff, 1, UniqueOneWord, EclipseOp),
    BLM    => (0xb7c8, 0xffff, 1, UniqueOneWord, EclipseOp),
    POPJ   => (0x9fc8, 0xffff, 1, UniqueOneWord, EclipseStack),
    RTN    => (0xa7a8, 0xffff, 1, UniqueOneWord, EclipseStack),
    SAVE   => (0xe7a8, 0xffff, 2, UniqueTwoWord, EclipseStack),
    ADDI   => (0xe7f8, 0xe7ff, 2, OneAccImm2Word, EclipseOp),
    ANDI   => (0xc7f8, 0xe7ff, 2, OneAccImmWd2Word, EclipseOp),
    IORI   => (0x87f8, 0xe7ff, 2, OneAccImmWd2Word, EclipseOp),
    XORI   => (0xa7f8, 0xe7ff, 2, OneAccImmWd2Word, EclipseOp),
    WBR    => (0x8038, 0x843f, 1, SplitEightBitDisp, EaglePc),
    NADD   => (0x8089, 0x87ff, 1, TwoAccOneWord, EagleOp),
    NSUB   => (0x8099, 0x87ff, 1, TwoAccOneWord, EagleOp),
    NMUL   => (0x8449, 0x87ff, 1, TwoAccOneWord, EagleOp),
    NDIV   => (0x80a9, 0x87ff, 1, TwoAccOneWord, EagleOp),
    NNEG   => (0x8109, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WADD   => (0x8149, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WADC   => (0x8189, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WSUB   => (0x8159, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WAND   => (0x8199, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WIOR   => (0x8209, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WXOR   => (0x8249, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WANC   => (0x8289, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WINC   => (0x8259, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WNEG   => (0x8269, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WCOM   => (0x8299, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WMOV   => (0x8379, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WMUL   => (0x8669, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WDIV   => (0x8469, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WLSH   => (0x8559, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WASH   => (0x8279, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WBTO   => (0x80b9, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WBTZ   => (0x82d9, 0x87ff, 1, TwoAccOneWord, EagleOp),
    ZEX    => (0x8359, 0x87ff, 1, TwoAccOneWord, EagleOp),
    SEX    => (0x8349, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WXCH   => (0x8369, 0x87ff, 1, TwoAccOneWord, EagleOp),
    WADI   => (0x80c9, 0x87ff, 1, ImmOneAcc, EagleOp),
    WSBI   => (0x8589, 0x87ff, 1, ImmOneAcc, EagleOp),
    NADI   => (0x8599, 0x87ff, 1, ImmOneAcc, EagleOp),
    NSBI   => (0x85a9, 0x87ff, 1, ImmOneAcc, EagleOp),
    WLSI   => (0x85b9, 0x87ff, 1, ImmOneAcc, EagleOp),
    NADDI  => (0xc639, 0xe7ff, 2, OneAccImm2Word, EagleOp),
    NLDAI  => (0xc629, 0xe7ff, 2, OneAccImm2Word, EagleOp),
    WLSHI  => (0x8239, 0xe7ff, 2, OneAccImm2Word, EagleOp),
    WASHI  => (0xc6b9, 0xe7ff, 2, OneAccImm2Word, EagleOp),
    WADDI  => (0x8689, 0xe7ff, 3, OneAccImmDwd3Word, EagleOp),
    WANDI  => (0x8699, 0xe7ff, 3, OneAccImmDwd3Word, EagleOp),
    WIORI  => (0x86a9, 0xe7ff, 3, OneAccImmDwd3Word, EagleOp),
    WXORI  => (0x86b9, 0xe7ff, 3, OneAccImmDwd3Word, EagleOp),
    WLDAI  => (0xc689, 0xe7ff, 3, OneAccImmDwd3Word, EagleOp),
    CVWN   => (0x82a9, 0xe7ff, 1, OneAccOneWord, EagleOp),
    WHLV   => (0x82c9, 0xe7ff, 1, OneAccOneWord, EagleOp),
    WMOVR  => (0xe699, 0xe7ff, 1, OneAccOneWord, EagleOp),
    CRYTC  => (0xa7e9, 0xffff, 1, UniqueOneWord, EagleOp),
    CRYTO  => (0xa7a9, 0xffff, 1, UniqueOneWord, EagleOp),
    CRYTZ  => (0xa7c9, 0xffff, 1, UniqueOneWord, EagleOp),
    WBLM   => (0xe749, 0xffff, 1, UniqueOneWord, EagleOp),
    WCMV   => (0xf549, 0xffff, 1, UniqueOneWord, EagleOp),
    XNLDA  => (0x8329, 0x87ff, 2, OneAccModeInd2WordX, EagleMemRef),
    XNSTA  => (0x8339, 0x87ff, 2, OneAccModeInd2WordX, EagleMemRef),
    XWLDA  => (0x8309, 0x87ff, 2, OneAccModeInd2WordX, EagleMemRef),
    XWSTA  => (0x8319, 0x87ff, 2, OneAccModeInd2WordX, EagleMemRef),
    XLEF   => (0x8409, 0x87ff, 2, OneAccModeInd2WordX, EagleMemRef),
    XNADD  => (0x80d9, 0x87ff, 2, OneAccModeInd2WordX, EagleMemRef),
    XNSUB  => (0x80e9, 0x87ff, 2, OneAccModeInd2WordX, EagleMemRef),
    XWADD  => (0x8119, 0x87ff, 2, OneAccModeInd2WordX, EagleMemRef),
    XWSUB  => (0x80f9, 0x87ff, 2, OneAccModeInd2WordX, EagleMemRef),
    XLDB   => (0x8419, 0x87ff, 2, OneAccMode2WordXB, EagleMemRef),
    XSTB   => (0x8429, 0x87ff, 2, OneAccMode2WordXB, EagleMemRef),
    XLEFB  => (0x8439, 0x87ff, 2, OneAccMode2WordXB, EagleMemRef),
    LNLDA  => (0x83c9, 0x87ff, 3, OneAccModeInd3Word, EagleMemRef),
    LNSTA  => (0x83d9, 0x87ff, 3, OneAccModeInd3Word, EagleMemRef),
    LWLDA  => (0x83e9, 0x87ff, 3, OneAccModeInd3Word, EagleMemRef),
    LWSTA  => (0x8129, 0x87ff, 3, OneAccModeInd3Word, EagleMemRef),
    LLEF   => (0x83f9, 0x87ff, 3, OneAccModeInd3Word, EagleMemRef),
    LNADD  => (0x8619, 0x87ff, 3, OneAccModeInd3Word, EagleMemRef),
    LNSUB  => (0x8659, 0x87ff, 3, OneAccModeInd3Word, EagleMemRef),
    LWADD  => (0x8719, 0x87ff, 3, OneAccModeInd3Word, EagleMemRef),
    LWSUB  => (0x8759, 0x87ff, 3, OneAccModeInd3Word, EagleMemRef),
    LLDB   => (0x8139, 0x87ff, 3, OneAccMode3Word, EagleMemRef),
    LSTB   => (0x8169, 0x87ff, 3, OneAccMode3Word, EagleMemRef),
    LLEFB  => (0x8179, 0x87ff, 3, OneAccMode3Word, EagleMemRef),
    WLDB   => (0x8529, 0x87ff, 1, TwoAccOneWord, EagleMemRef),
    WSTB   => (0x8539, 0x87ff, 1, TwoAccOneWord, EagleMemRef),
    LDAFP  => (0x8389, 0xe7ff, 1, OneAccOneWord, EagleMemRef),
    STAFP  => (0xa679, 0xe7ff, 1, OneAccOneWord, EagleMemRef),
    LDATS  => (0xa649, 0xe7ff, 1, OneAccOneWord, EagleMemRef),
    STATS  => (0x8399, 0xe7ff, 1, OneAccOneWord, EagleMemRef),
    LDASB  => (0xa689, 0xe7ff, 1, OneAccOneWord, EagleMemRef),
    STASB  => (0xa699, 0xe7ff, 1, OneAccOneWord, EagleMemRef),
    LDASL  => (0xa6a9, 0xe7ff, 1, OneAccOneWord, EagleMemRef),
    STASL  => (0xa6b9, 0xe7ff, 1, OneAccOneWord, EagleMemRef),
    XJMP   => (0xc609, 0xe7ff, 2, NoAccModeInd2WordX, EaglePc),
    XJSR   => (0x83a9, 0xe7ff, 2, NoAccModeInd2WordX, EaglePc),
    XNISZ  => (0x8639, 0xe7ff, 2, NoAccModeInd2WordX, EaglePc),
    XNDSZ  => (0xa639, 0xe7ff, 2, NoAccModeInd2WordX, EaglePc),
    XWISZ  => (0x8649, 0xe7ff, 2, NoAccModeInd2WordX, EaglePc),
    XWDSZ  => (0x83b9, 0xe7ff, 2, NoAccModeInd2WordX, EaglePc),
    LJMP   => (0xa6d9, 0xe7ff, 3, NoAccModeInd3Word, EaglePc),
    LJSR   => (0xa7d9, 0xe7ff, 3, NoAccModeInd3Word, EaglePc),
    LNISZ  => (0xc6d9, 0xe7ff, 3, NoAccModeInd3Word, EaglePc),
    LNDSZ  => (0xc6e9, 0xe7ff, 3, NoAccModeInd3Word, EaglePc),
    LWISZ  => (0xc6f9, 0xe7ff, 3, NoAccModeInd3Word, EaglePc),
    LWDSZ  => (0xc7f9, 0xe7ff, 3, NoAccModeInd3Word, EaglePc),
    WSEQ   => (0x81a9, 0x87ff, 1, TwoAccOneWord, EaglePc),
    WSNE   => (0x81b9, 0x87ff, 1, TwoAccOneWord, EaglePc),
    WSGE   => (0x81c9, 0x87ff, 1, TwoAccOneWord, EaglePc),
    WSGT   => (0x81d9, 0x87ff, 1, TwoAccOneWord, EaglePc),
    WSLE   => (0x81e9, 0x87ff, 1, TwoAccOneWord, EaglePc),
    WSLT   => (0x82b9, 0x87ff, 1, TwoAccOneWord, EaglePc),
    WUSGT  => (0x81f9, 0x87ff, 1, TwoAccOneWord, EaglePc),
    WSZB   => (0x82e9, 0x87ff, 1, TwoAccOneWord, EaglePc),
    WSNB   => (0x82f9, 0x87ff, 1, TwoAccOneWord, EaglePc),
    WCLM   => (0x8569, 0x87ff, 1, TwoAccOneWord, EaglePc),
    WSEQI  => (0xe6c9, 0xe7ff, 2, OneAccImm2Word, EaglePc),
    WSNEI  => (0xe6e9, 0xe7ff, 2, OneAccImm2Word, EaglePc),
    WSGTI  => (0xe6d9, 0xe7ff, 2, OneAccImm2Word, EaglePc),
    WSLEI  => (0xe6a9, 0xe7ff, 2, OneAccImm2Word, EaglePc),
    WSKBO  => (0x8009, 0x878f, 1, OneAccBit, EaglePc),
    WSKBZ  => (0x8489, 0x878f, 1, OneAccBit, EaglePc),
    ISZTS  => (0xc7c9, 0xffff, 1, UniqueOneWord, EaglePc),
    DSZTS  => (0xc7d9, 0xffff, 1, UniqueOneWord, EaglePc),
    XCALL  => (0x8609, 0xe7ff, 3, NoAccModeInd3WordXcall, EaglePc),
    LCALL  => (0xa6c9, 0xe7ff, 4, NoAccModeInd4WordLcall, EaglePc),
    LDSP   => (0x8519, 0x87ff, 3, OneAccModeInd3Word, EaglePc),
    XNDO   => (0x8219, 0x87ff, 3, ThreeWordDo, EaglePc),
    LNDO   => (0x8799, 0x87ff, 4, FourWordDo, EaglePc),
    WPSH   => (0x8579, 0x87ff, 1, TwoAccOneWord, EagleStack),
    WPOP   => (0x8229, 0x87ff, 1, TwoAccOneWord, EagleStack),
    WPOPJ  => (0x8789, 0xffff, 1, UniqueOneWord, EagleStack),
    WRTN   => (0x87a9, 0xffff, 1, UniqueOneWord, EagleStack),
    WSAVR  => (0xa729, 0xffff, 2, UniqueTwoWord, EagleStack),
    WSAVS  => (0xa739, 0xffff, 2, UniqueTwoWord, EagleStack),
    WMSP   => (0xe649, 0xe7ff, 1, OneAccOneWord, EagleStack),
    LPEF   => (0xa6f9, 0xe7ff, 3, NoAccModeInd3Word, EagleStack),
    LPEFB  => (0x8459, 0xe7ff, 3, NoAccMode3Word, EagleStack),
    XPEF   => (0x8479, 0xe7ff, 2, NoAccModeInd2WordX, EagleStack),
    LPSHJ  => (0x8509, 0xe7ff, 3, NoAccModeInd3Word, EagleStack),
    XPSHJ  => (0x8549, 0xe7ff, 2, NoAccModeInd2WordX, EagleStack),
    CIO    => (0x85e9, 0x87ff, 1, TwoAccOneWord, EagleIo),
    CIOI   => (0x85f9, 0x87ff, 2, TwoAccImm2Word, EagleIo),
    WLMP   => (0xa7f9, 0xffff, 1, UniqueOneWord, EagleIo),
    LCPID  => (0x85c9, 0xffff, 1, UniqueOneWord, EagleIo),
    LSBRA  => (0x8fa9, 0xffff, 1, UniqueOneWord, EagleIo),
}

const NO_MATCH: u8 = 0xff;

/// Nova operate words with these low nibbles (no-load, never/always skip)
/// are claimed by the Eclipse (8) and Eagle (9) instruction sets.
fn nova_op_reserved(opcode: u16) -> bool {
    matches!(opcode & 0xf, 8 | 9)
}

fn scan(opcode: u16, lef_mode: bool) -> Option<usize> {
    if lef_mode {
        if let Some(i) = DESCRIPTORS
            .iter()
            .position(|d| d.mnemonic == Mnemonic::LEF && opcode & d.mask == d.bits)
        {
            return Some(i);
        }
    }

    DESCRIPTORS.iter().position(|d| {
        opcode & d.mask == d.bits
            && d.mnemonic != Mnemonic::LEF
            && !(d.class == InstrClass::NovaOp && nova_op_reserved(opcode))
    })
}

fn build_cache(lef_mode: bool) -> Vec<u8> {
    (0..=0xffffu16)
        .map(|op| scan(op, lef_mode).map(|i| i as u8).unwrap_or(NO_MATCH))
        .collect()
}

lazy_static! {
    static ref OPCODE_CACHE: Vec<u8> = build_cache(false);
    static ref LEF_OPCODE_CACHE: Vec<u8> = build_cache(true);
}

/// Find the descriptor for an opcode.
///
/// When `lef_mode` is set, LEF claims its whole encoding space ahead of the
/// I/O instructions it overlaps; otherwise LEF is never a candidate. The
/// eight Nova operate mnemonics never match a word whose low nibble is 8 or 9.
pub fn find(opcode: u16, lef_mode: bool) -> Option<&'static Descriptor> {
    let cache: &Vec<u8> = if lef_mode {
        &*LEF_OPCODE_CACHE
    } else {
        &*OPCODE_CACHE
    };
    match cache[opcode as usize] {
        NO_MATCH => None,
        i => Some(&DESCRIPTORS[i as usize]),
    }
}

/// Look up a descriptor by mnemonic.
pub fn descriptor(mnemonic: Mnemonic) -> &'static Descriptor {
    &DESCRIPTORS[mnemonic as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_fits_cache_index() {
        assert!(DESCRIPTORS.len() < NO_MATCH as usize);
        for (i, d) in DESCRIPTORS.iter().enumerate() {
            assert_eq!(i, d.mnemonic as usize);
            assert_eq!(d.bits & d.mask, d.bits, "{}", d.mnemonic.name());
            assert!((1..=4).contains(&d.len));
        }
    }

    #[test]
    fn finds_nova_instructions() {
        assert_eq!(Mnemonic::JMP, find(0o000010, false).unwrap().mnemonic);
        assert_eq!(Mnemonic::DSZ, find(0o014000, false).unwrap().mnemonic);
        assert_eq!(Mnemonic::LDA, find(0o020401, false).unwrap().mnemonic);
        assert_eq!(Mnemonic::STA, find(0o054000, false).unwrap().mnemonic);
        // ADD 2,3
        assert_eq!(Mnemonic::ADD, find(0o153000, false).unwrap().mnemonic);
        // SUBZL# 1,2,SZC
        assert_eq!(Mnemonic::SUB, find(0o132522, false).unwrap().mnemonic);
    }

    #[test]
    fn nova_operate_gives_way_on_reserved_nibbles() {
        // ADD 0,0 with no-load and never-skip would be 0x8608: PSH.
        assert_eq!(Mnemonic::PSH, find(0x8608, false).unwrap().mnemonic);
        // Tail 9 belongs to the Eagle set.
        assert_eq!(Mnemonic::WADD, find(0x8149, false).unwrap().mnemonic);
        // An unassigned tail-8 word is not a Nova operate either.
        let d = find(0x8718, false);
        assert!(d.map(|d| d.class != InstrClass::NovaOp).unwrap_or(true));
    }

    #[test]
    fn cpu_forms_precede_generic_io() {
        assert_eq!(Mnemonic::INTEN, find(0x607f, false).unwrap().mnemonic);
        assert_eq!(Mnemonic::HALT, find(0x663f, false).unwrap().mnemonic);
        assert_eq!(Mnemonic::READS, find(0x693f, false).unwrap().mnemonic);
        assert_eq!(Mnemonic::NCLID, find(0x683f, false).unwrap().mnemonic);
        // DOAS 0,TTO
        assert_eq!(Mnemonic::DOA, find(0o061111, false).unwrap().mnemonic);
        assert_eq!(Mnemonic::SKP, find(0o063511, false).unwrap().mnemonic);
    }

    #[test]
    fn lef_mode_claims_io_space() {
        assert_eq!(Mnemonic::DIA, find(0x6110, false).unwrap().mnemonic);
        assert_eq!(Mnemonic::LEF, find(0x6110, true).unwrap().mnemonic);
        assert_eq!(Mnemonic::LEF, find(0x607f, true).unwrap().mnemonic);
        // Outside the I/O space nothing changes.
        assert_eq!(Mnemonic::LDA, find(0x2000, true).unwrap().mnemonic);
    }

    #[test]
    fn finds_multiword_instructions() {
        let d = find(0xa6c9, false).unwrap();
        assert_eq!(Mnemonic::LCALL, d.mnemonic);
        assert_eq!(4, d.len);
        assert_eq!(Layout::NoAccModeInd4WordLcall, d.layout);

        let d = find(0x8689 | 0x1800, false).unwrap();
        assert_eq!(Mnemonic::WADDI, d.mnemonic);
        assert_eq!(3, d.len);
    }

    #[test]
    fn descriptor_by_mnemonic() {
        let d = descriptor(Mnemonic::WBLM);
        assert_eq!(0xe749, d.bits);
        assert_eq!(InstrClass::EagleOp, d.class);
    }
}
