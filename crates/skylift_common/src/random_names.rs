use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "able", "agile", "amber", "bold", "brave", "bright", "calm", "clever", "cosmic", "crimson",
    "daring", "deft", "eager", "fast", "fierce", "gentle", "golden", "happy", "humble", "keen",
    "lively", "lucid", "mellow", "mighty", "noble", "polar", "proud", "quiet", "rapid", "shiny",
    "silent", "smart", "solid", "stable", "steady", "sturdy", "sunny", "swift", "vivid", "witty",
];

const ANIMALS: &[&str] = &[
    "badger", "bison", "bobcat", "camel", "cheetah", "cobra", "condor", "coyote", "crane", "deer",
    "dolphin", "eagle", "falcon", "ferret", "fox", "gazelle", "gecko", "heron", "ibex", "jackal",
    "jaguar", "koala", "lemur", "lynx", "mantis", "marmot", "marten", "moose", "narwhal", "ocelot",
    "osprey", "otter", "panda", "pelican", "puffin", "raven", "salmon", "seal", "sparrow", "stork",
    "tapir", "terrier", "toucan", "turtle", "walrus", "wombat", "wren", "zebra",
];

/// Generate a memorable `adjective-animal` name.
///
/// The namespace is large enough that callers drawing against a set of
/// existing names terminate after a handful of retries in expectation.
pub fn generate_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let animal = ANIMALS[rng.gen_range(0..ANIMALS.len())];
    format!("{adjective}-{animal}")
}
