//! Known "missing runtime" failures and the messages shown for them

/// (substring, user-facing message). Matched case-insensitively, first hit wins,
/// so specific patterns must come before generic ones.
pub const RUNTIME_DEPENDENCY_PATTERNS: &[(&str, &str)] = &[
    (
        "vcruntime140",
        "This game needs the Microsoft Visual C++ Redistributable. Install the latest x64 package from Microsoft and try again.",
    ),
    (
        "msvcp140",
        "This game needs the Microsoft Visual C++ Redistributable. Install the latest x64 package from Microsoft and try again.",
    ),
    (
        "d3dx9_",
        "This game needs the DirectX 9 runtime (d3dx9). Install the DirectX End-User Runtime and try again.",
    ),
    (
        "xinput1_3",
        "This game needs the DirectX 9 runtime (XInput). Install the DirectX End-User Runtime and try again.",
    ),
    (
        "you must install .net desktop runtime",
        "This game needs the .NET Desktop Runtime. Install it from Microsoft and try again.",
    ),
    (
        "libmono",
        "This game needs the Mono runtime. Install the mono package for your system and try again.",
    ),
    (
        "libsdl2",
        "This game needs the SDL2 library. Install libsdl2 (e.g. `sudo apt install libsdl2-2.0-0`) and try again.",
    ),
    (
        "libgl.so",
        "This game needs OpenGL libraries. Install your graphics driver's OpenGL package and try again.",
    ),
    (
        "no module named 'pygame'",
        "This game needs pygame. Install it with `pip install pygame` and try again.",
    ),
    (
        "python3: not found",
        "This game needs Python 3. Install Python 3 and try again.",
    ),
    (
        "java: not found",
        "This game needs a Java runtime. Install Java (JRE 17 or newer) and try again.",
    ),
    (
        "error while loading shared libraries",
        "This game is missing a system library it depends on. Check the launcher log for the library name.",
    ),
];

/// User-facing message for a recognized runtime dependency problem in `text`
pub fn match_runtime_dependency(text: &str) -> Option<&'static str> {
    let haystack = text.to_lowercase();
    RUNTIME_DEPENDENCY_PATTERNS
        .iter()
        .find(|(pattern, _)| haystack.contains(pattern))
        .map(|(_, message)| *message)
}
