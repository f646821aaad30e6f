pub(super) const ROOT_LONG_ABOUT: &str = "\
Checksum inventories and verification for digital preservation

Preserve builds checksum inventories of directory trees, reconciles inventories
against each other or against live directories, and checks that inventoried files
made it into BagIt bags intact.

CORE CONCEPTS:

  Inventory:
    A CSV file with one row per file: BATCH, PATH, DIRECTORY, RELPATH, FILENAME,
    EXTENSION, BYTES, MTIME, MODDATE, MD5, ETAG, SHA1, SHA256, STORAGEPROVIDER
    and STORAGELOCATION. Rows are flushed one at a time, so an interrupted
    run can be resumed without checksumming the same file twice.

  Collection:
    Anything verify, compare and bagcheck accept as input: a directory (scanned
    on the fly), an inventory CSV, a delimited export with a Filename or Key
    column, or a backup server report. Relative paths are computed from the
    common root of the collection.

  Hidden files:
    Files and directories whose name starts with '.' are never listed.

TYPICAL WORKFLOW:

  1. Inventory a batch as it arrives:
     $ preserve inventory /mnt/incoming/batch7 --batch batch7 -o batch7.csv

  2. If the run is interrupted, resume it:
     $ preserve inventory /mnt/incoming/batch7 --batch batch7 -e batch7.csv

  3. After copying the batch to storage, reconcile:
     $ preserve verify batch7.csv /mnt/storage/batch7

  4. After bagging, check the bag:
     $ preserve bagcheck -i batch7.csv -b /mnt/bags/batch7.tar.gz

COMMANDS:

  inventory   Build or resume an inventory CSV
  verify      Reconcile two collections (unchanged, modified, added, deleted, moved)
  compare     Values common to several collections and unique to each
  bagcheck    Check an inventory against the payload manifest of a bag
  partition   Sort a flat directory into subdirectories by filename pattern
  annotate    Locate inventoried files on disk and fill in missing checksums
  batch       Inventory every subdirectory of a root, resumably

LOGGING:

  Diagnostics go to stderr, reports and inventories to stdout. By default only
  warnings and errors are shown. Use -v for progress, -vv for per-file detail,
  or --log-level to pick a level. RUST_LOG is honored when neither is given.

EXIT CODES:

  0    Success, including comparisons that found differences
  1    verify --strict found differences
  255  Error (I/O errors, malformed inputs, invalid arguments, etc.)

For detailed help on each command, run:
  preserve inventory --help
  preserve verify --help
  preserve bagcheck --help
  preserve partition --help
  preserve batch --help
";

pub(super) const INVENTORY_LONG_ABOUT: &str = "\
Build or resume a checksum inventory of a directory

Every non-hidden file under PATH is listed, checksummed and written as one row of
an inventory CSV. Rows are flushed as soon as each file is done.

OUTPUT:

  (no flag)     The inventory is written to stdout.
  -o FILE       A new inventory is written to FILE. Fails if FILE exists.
  -e FILE       FILE is a partial inventory from an earlier run, which is resumed.

RESUMING (-e):

  The rows already in FILE are trusted and never checksummed again. Only files
  missing from FILE are processed and appended. A final line cut short by an
  interruption is discarded and its file is redone.

  The run fails without touching FILE when:
    - FILE is not an inventory CSV, or has rows without a PATH
    - FILE records a path that is no longer under PATH

  When FILE already records every file, nothing is written.

CHECKSUMS:

  -a selects the algorithms (md5, sha1, sha256). The ETAG column is always
  filled when md5 is selected: the plain md5 for files up to --etag-chunk-size,
  otherwise the multipart form '<md5 of part digests>-<parts>'.

EXAMPLES:

  # Inventory to a new file with every algorithm
  $ preserve -v inventory /mnt/incoming/batch7 --batch batch7 -o batch7.csv

  # md5 only, with a drive label
  $ preserve inventory /mnt/drive3 --batch b3 -a md5 -l DRIVE3 -o drive3.csv

  # Resume after an interruption
  $ preserve inventory /mnt/incoming/batch7 --batch batch7 -e batch7.csv
";

pub(super) const VERIFY_LONG_ABOUT: &str = "\
Reconcile two inventories or directories

FIRST and SECOND may each be a directory, an inventory CSV, a delimited export or
a backup server report. Files are matched by relative path and by content
signature (md5 and size).

OUTCOMES:

  M  modified   Same relative path, different content
  A  added      Only in SECOND, content not in FIRST
  D  deleted    Only in FIRST, content not in SECOND
  R  moved      Same content under a different relative path

  Files with the same path and content are counted as unchanged. Files with no
  recorded checksum are never reported as moved.

NARROWER MODES:

  -c, -r and -f compare by a single criterion (checksum and size, relative path
  or filename) and list what each side has that the other lacks. They can be
  combined.

EXIT STATUS:

  Differences are a normal result and exit 0. With --strict, differences exit 1
  so scripts can react.

EXAMPLES:

  $ preserve verify batch7.csv /mnt/storage/batch7
  $ preserve verify --strict old.csv new.csv
  $ preserve verify -r -f tsm_report.txt /mnt/storage/batch7
";

pub(super) const BAGCHECK_LONG_ABOUT: &str = "\
Check that every inventoried file is in a bag

BAG may be a bag directory, a tar archive or a gzipped tar archive. Its payload
manifests (manifest-sha256.txt and manifest-md5.txt) are read. An inventory file
is checked against the first manifest whose algorithm it records for every file.
A directory is checksummed with sha256 when the bag has that manifest, otherwise
with md5.

Bag paths usually carry extra leading directories (data/, a bag name). Leading
segments are stripped until the paths line up with the inventory's relative
paths, keeping the smallest strip with the most matches. The report then lists
(checksum, path) pairs missing from the bag and extra in the bag.

EXAMPLE:

  $ preserve bagcheck -i batch7.csv -b /mnt/bags/batch7.tar.gz
";

pub(super) const PARTITION_LONG_ABOUT: &str = "\
Sort a flat directory into subdirectories by filename pattern

Files named like 'litms-0042_p001.tif' go to DEST/litms-0042/. Files that do not
match the pattern go to DEST/extra/.

DEST must be missing or empty. Before any file is touched, the plan is checked
for two files landing on the same destination and for destinations that exist.

MODES:

  dryrun   Print the plan only (default)
  copy     Copy files, leaving SOURCE intact
  move     Move files

EXAMPLE:

  $ preserve partition /mnt/scans /mnt/sorted
  $ preserve partition /mnt/scans /mnt/sorted -m move
";

pub(super) const BATCH_LONG_ABOUT: &str = "\
Inventory every subdirectory of a root, resumably

CONFIG is a TOML file:

  input_root = \"/mnt/drive3\"
  output_root = \"/mnt/inventories/drive3\"
  manifest = \"/mnt/inventories/drive3/status.csv\"
  excludes = [\"scratch\"]
  batch = \"drive3\"          # optional, defaults to the input root's name
  algorithms = \"md5,sha256\" # optional, defaults to md5

On the first run every immediate subdirectory of input_root is surveyed (file
count and size) and recorded in the status CSV at 'manifest', with excluded
directories marked Exclude. Each directory still marked ToDo is then inventoried
into output_root/<dirname>.csv and marked Complete.

Run the same command again after an interruption: completed directories are
skipped and a partial directory inventory is resumed.

EXAMPLE:

  $ preserve -v batch drive3.toml
";
